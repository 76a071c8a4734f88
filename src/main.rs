//! finance-mcp: MCP server for Tushare market data
//!
//! Serves the capital-flow and sector tools over stdio (the default) or
//! streamable HTTP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use finance_mcp::config::{self, Config};
use finance_mcp::http::HttpServer;
use finance_mcp::mcp::McpServer;
use finance_mcp::tools::ToolRegistry;
use finance_mcp::tushare::TushareProvider;

/// MCP server exposing Tushare capital-flow, sector index and sector
/// membership data as tools.
#[derive(Parser, Debug)]
#[command(name = "finance-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Transport to serve MCP on
    #[arg(short, long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Address to bind the HTTP transport to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port for the HTTP transport (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// Streamable HTTP on POST /mcp
    Http,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs always go to stderr; stdout belongs to the stdio transport.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Applies CLI overrides on top of the loaded configuration.
fn apply_overrides(cfg: &mut Config, args: &Args) {
    if let Some(host) = &args.host {
        cfg.http.host.clone_from(host);
    }
    if let Some(port) = args.port {
        cfg.http.port = port;
    }
}

/// Entry point for the finance-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig is read from: {}", default_path.display());
                    eprintln!("Create one based on config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };
    apply_overrides(&mut cfg, &args);

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?args.transport,
        "Starting finance-mcp server"
    );

    let provider = match TushareProvider::new(&cfg.tushare.api_url, cfg.tushare.token.clone()) {
        Ok(provider) => provider,
        Err(e) => {
            error!(error = %e, "Failed to create Tushare client");
            return ExitCode::FAILURE;
        }
    };

    if !provider.has_default_token() {
        warn!("TUSHARE_TOKEN is not set; tool calls need a per-request token");
    }

    let registry = match ToolRegistry::with_catalogue(Arc::new(provider)) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "Failed to build tool registry");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.transport {
        Transport::Stdio => {
            info!("MCP server ready, waiting for client connection...");
            let mut server = McpServer::new(registry);
            runtime.block_on(server.run())
        }
        Transport::Http => {
            let server = HttpServer::new(&cfg, registry);
            runtime.block_on(server.start())
        }
    };

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn verbosity_overrides_config_level() {
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "nonsense"), Level::WARN);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
        assert_eq!(get_log_level(3, true, "trace"), Level::ERROR);
    }

    #[test]
    fn cli_overrides_apply() {
        let args = Args::parse_from(["finance-mcp", "--transport", "http", "--port", "8080"]);
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, &args);
        assert_eq!(args.transport, Transport::Http);
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.http.host, "0.0.0.0");
    }
}
