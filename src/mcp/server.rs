//! stdio MCP server.
//!
//! One [`McpEngine`] serves the whole process. Lines are read from the
//! transport until EOF or a shutdown signal; every request gets exactly one
//! reply line and notifications get none. Tool calls use the configured
//! token.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::mcp::engine::McpEngine;
use crate::mcp::protocol::parse_message;
use crate::mcp::transport::{LineTransport, StdioTransport};
use crate::tools::ToolRegistry;

/// The MCP server for the stdio transport.
pub struct McpServer<R = BufReader<tokio::io::Stdin>, W = tokio::io::Stdout> {
    engine: McpEngine,
    transport: LineTransport<R, W>,
}

impl McpServer {
    /// Creates a server on stdin/stdout.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_transport(registry, StdioTransport::stdio())
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a server on an arbitrary transport.
    #[must_use]
    pub const fn with_transport(registry: Arc<ToolRegistry>, transport: LineTransport<R, W>) -> Self {
        Self {
            engine: McpEngine::new(registry),
            transport,
        }
    }

    /// The session engine.
    #[must_use]
    pub const fn engine(&self) -> &McpEngine {
        &self.engine
    }

    /// Consumes the server, returning its transport.
    pub fn into_transport(self) -> LineTransport<R, W> {
        self.transport
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs the main loop until EOF or until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run_until<F>(&mut self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles the result from transport read.
    ///
    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: io::Result<Option<String>>,
    ) -> io::Result<bool> {
        let Some(line) = line_result? else {
            tracing::info!("stdin closed");
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        self.handle_line(&line).await?;
        Ok(false)
    }

    /// Handles a single line of input.
    async fn handle_line(&mut self, line: &str) -> io::Result<()> {
        match parse_message(line) {
            Ok(msg) => {
                if let Some(reply) = self.engine.handle_message(msg, None).await {
                    self.transport.write_message(&reply).await?;
                }
                Ok(())
            }
            Err(error) => {
                tracing::debug!(code = error.code(), "Rejected malformed message");
                self.transport.write_message(&error).await
            }
        }
    }
}

/// Completes on SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }

        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Completes on Ctrl+C.
#[cfg(windows)]
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return std::future::pending().await;
    }
    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::error::UpstreamError;
    use crate::mcp::engine::EngineState;
    use crate::tushare::{DataProvider, QueryParams, Record};

    struct Empty;

    #[async_trait]
    impl DataProvider for Empty {
        async fn query(
            &self,
            _token: Option<&str>,
            _api_name: &str,
            _params: &QueryParams,
        ) -> Result<Vec<Record>, UpstreamError> {
            Ok(Vec::new())
        }
    }

    async fn run_script(input: &'static str) -> (Vec<Value>, EngineState) {
        let registry = Arc::new(ToolRegistry::with_catalogue(Arc::new(Empty)).unwrap());
        let transport = LineTransport::new(input.as_bytes(), Vec::new());
        let mut server = McpServer::with_transport(registry, transport);

        server.run_until(std::future::pending()).await.unwrap();

        let state = server.engine().state();
        let output = String::from_utf8(server.into_transport().into_writer()).unwrap();
        let replies = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (replies, state)
    }

    #[tokio::test]
    async fn replies_once_per_request() {
        let (replies, state) = run_script(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        ))
        .await;

        assert_eq!(state, EngineState::Ready);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["id"], 2);
        assert_eq!(replies[1]["result"]["tools"].as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn invalid_json_gets_parse_error() {
        let (replies, _) = run_script("{not json\n").await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["error"]["code"], -32700);
        assert_eq!(replies[0]["id"], Value::Null);
    }

    #[tokio::test]
    async fn request_before_initialize_rejected() {
        let (replies, state) =
            run_script("{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"tools/list\"}\n").await;
        assert_eq!(state, EngineState::Uninitialised);
        assert_eq!(replies[0]["error"]["code"], -32000);
        assert_eq!(replies[0]["id"], 7);
    }

    #[tokio::test]
    async fn malformed_notifications_get_no_reply() {
        let (replies, _) = run_script(concat!(
            r#"{"method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"1.0","id":null,"method":"notifications/cancelled"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            "\n",
        ))
        .await;

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["id"], 3);
        assert_eq!(replies[0]["error"]["code"], -32000);
    }
}
