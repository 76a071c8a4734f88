//! Request handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::mcp::protocol::{
    parse_value, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData, JsonRpcResponse,
    OutgoingMessage, NO_SESSION_CODE, SERVER_NAME,
};
use crate::mcp::SessionStore;

/// Session id header, read from requests and set on session creation.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// MCP endpoint: one JSON-RPC message per POST.
pub async fn mcp(
    State(store): State<Arc<SessionStore>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.iter().all(u8::is_ascii_whitespace) {
        return bad_request("Empty request body");
    }

    let value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed body");
            return bad_request("Invalid JSON body");
        }
    };

    let message = match parse_value(value) {
        Ok(message) => message,
        Err(error) => return envelope(StatusCode::BAD_REQUEST, error),
    };

    let session_id = header_value(&headers, SESSION_HEADER);

    let request = match message {
        IncomingMessage::Notification(notification) => {
            let known = store.notify(session_id);
            tracing::debug!(method = %notification.method, session = ?session_id, known, "Notification");
            return StatusCode::NO_CONTENT.into_response();
        }
        IncomingMessage::Request(request) => request,
    };

    let token = extract_token(&headers);
    let dispatched = store.dispatch(session_id, &request, token).await;

    let status = reply_status(&dispatched.reply);
    let mut response = envelope(status, dispatched.reply);

    if let Some(id) = dispatched.created {
        match HeaderValue::from_str(&id) {
            Ok(value) => {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
            Err(e) => tracing::error!(error = %e, "Session id is not a valid header value"),
        }
    }

    response
}

/// Any method other than POST on the MCP endpoint.
pub async fn method_not_allowed() -> Response {
    envelope(
        StatusCode::METHOD_NOT_ALLOWED,
        JsonRpcError::new(
            None,
            JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Method Not Allowed"),
        ),
    )
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    transport: &'static str,
    active_sessions: usize,
    server: &'static str,
    version: &'static str,
}

/// Health check handler.
pub async fn health(State(store): State<Arc<SessionStore>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        transport: "streamable-http",
        active_sessions: store.len(),
        server: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Picks the upstream token for a request.
///
/// `X-Tushare-Token`, then `X-Api-Key`, then `Authorization: Bearer <t>`.
/// Values are trimmed and empty ones skipped. `None` means the configured
/// token applies.
#[must_use]
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, "x-tushare-token")
        .or_else(|| header_value(headers, "x-api-key"))
        .or_else(|| header_value(headers, AUTHORIZATION.as_str()).and_then(bearer))
}

fn bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn reply_status(reply: &Result<JsonRpcResponse, JsonRpcError>) -> StatusCode {
    match reply {
        Err(error)
            if error.code() == NO_SESSION_CODE
                || error.code() == ErrorCode::MethodNotFound.code() =>
        {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::OK,
    }
}

fn bad_request(message: &str) -> Response {
    envelope(
        StatusCode::BAD_REQUEST,
        JsonRpcError::new(
            None,
            JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, message),
        ),
    )
}

fn envelope(status: StatusCode, reply: impl Into<OutgoingMessage>) -> Response {
    (status, Json(reply.into())).into_response()
}
