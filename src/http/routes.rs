//! Route definitions.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::http::handlers;
use crate::mcp::SessionStore;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Create the MCP router.
///
/// `POST /mcp` carries JSON-RPC; every other method on `/mcp` gets a 405
/// envelope. Bodies up to [`MAX_BODY_BYTES`] are accepted. `GET /health`
/// reports liveness and the session count.
pub fn create_router(store: Arc<SessionStore>) -> Router {
    Router::new()
        .route(
            "/mcp",
            post(handlers::mcp).fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(store)
}
