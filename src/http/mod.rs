//! Streamable-HTTP transport.
//!
//! Sessions are created by `initialize` and identified afterwards by the
//! `Mcp-Session-Id` header. Each request may carry its own Tushare token.
//!
//! ```ignore
//! use finance_mcp::http::HttpServer;
//!
//! let server = HttpServer::new(&config, registry);
//! server.start().await?;
//! ```

pub mod handlers;
pub mod routes;

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Config, HttpConfig};
use crate::mcp::{shutdown_signal, SessionPolicy, SessionStore};
use crate::tools::ToolRegistry;

pub use handlers::{extract_token, SESSION_HEADER};
pub use routes::create_router;

/// The HTTP MCP server.
pub struct HttpServer {
    config: HttpConfig,
    sweep_interval: Duration,
    store: Arc<SessionStore>,
}

impl HttpServer {
    /// Create a new server with an empty session store.
    #[must_use]
    pub fn new(config: &Config, registry: Arc<ToolRegistry>) -> Self {
        let policy = SessionPolicy::from(&config.sessions);
        Self {
            config: config.http.clone(),
            sweep_interval: config.sessions.sweep_interval(),
            store: Arc::new(SessionStore::new(registry, policy)),
        }
    }

    /// The session store.
    #[must_use]
    pub const fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Build the router with CORS and request tracing.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

        create_router(Arc::clone(&self.store))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Bind the configured address and serve until a shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub async fn start(&self) -> io::Result<()> {
        let ip: IpAddr = self
            .config
            .host
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let addr = SocketAddr::new(ip, self.config.port);

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "MCP HTTP server listening");
        info!("Health check: http://{addr}/health");

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sweeper = self.store.spawn_sweeper(self.sweep_interval);

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        sweeper.abort();
        info!(active_sessions = self.store.len(), "HTTP server stopped");
        result
    }
}
