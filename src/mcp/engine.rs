//! Transport-independent MCP lifecycle.
//!
//! One [`McpEngine`] exists per logical session: one for the whole process on
//! stdio, one per `Mcp-Session-Id` over HTTP. It owns the lifecycle state and
//! the negotiated protocol version; tools are reached through the shared
//! [`ToolRegistry`].
//!
//! 1. **Initialisation**: version negotiation, client info recorded
//! 2. **Operation**: `tools/list`, `tools/call` and `ping`

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::mcp::protocol::{
    ClientInfo, IncomingMessage, InitializeParams, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, OutgoingMessage, RequestId, ServerCapabilities, ServerInfo,
    ToolCallParams, ToolCallResult, MCP_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::tools::ToolRegistry;

/// Engine state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for initialize request.
    Uninitialised,
    /// Initialised; tools may be listed and called.
    Ready,
}

/// The MCP protocol engine for one session.
pub struct McpEngine {
    registry: Arc<ToolRegistry>,
    state: EngineState,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    client_info: Option<ClientInfo>,
}

impl std::fmt::Debug for McpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpEngine")
            .field("state", &self.state)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

impl McpEngine {
    /// Creates an uninitialised engine.
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            state: EngineState::Uninitialised,
            protocol_version: None,
            client_info: None,
        }
    }

    /// Returns the current engine state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Returns the negotiated protocol version, if initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Returns the client info sent with `initialize`, if any.
    #[must_use]
    pub const fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    /// Handles any parsed message; notifications produce no reply.
    pub async fn handle_message(
        &mut self,
        msg: IncomingMessage,
        token: Option<&str>,
    ) -> Option<OutgoingMessage> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(&req, token).await.into()),
            IncomingMessage::Notification(ref notif) => {
                self.handle_notification(notif);
                None
            }
        }
    }

    /// Handles a request.
    ///
    /// `token` is the per-request upstream credential; `None` defers to the
    /// configured token.
    ///
    /// # Errors
    ///
    /// Returns the JSON-RPC error to send back to the client.
    pub async fn handle_request(
        &mut self,
        req: &JsonRpcRequest,
        token: Option<&str>,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        if req.method == "initialize" {
            return self.handle_initialize(req);
        }

        self.require_ready(&req.id)?;

        match req.method.as_str() {
            "tools/list" => Ok(self.handle_tools_list(req)),
            "tools/call" => self.handle_tools_call(req, token).await,
            "ping" => Ok(Self::handle_ping(req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        }
    }

    /// Handles a notification. Never fails and never replies.
    pub fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                tracing::info!("Client confirmed initialisation");
            }
            "notifications/cancelled" => {
                tracing::info!(params = ?notif.params, "Client cancelled a request");
            }
            method if notif.is_mcp_notification() => {
                tracing::debug!(method, "Ignoring notification");
            }
            method => {
                tracing::debug!(method, "Ignoring message without id");
            }
        }
    }

    /// Handles the initialize request.
    ///
    /// Accepted in any state; a repeated initialize renegotiates.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let params: InitializeParams = match &req.params {
            None | Some(Value::Null) => InitializeParams::default(),
            Some(p) => serde_json::from_value(p.clone()).map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid initialize params: {e}"),
                )
            })?,
        };

        let negotiated_version = negotiate_version(params.protocol_version.as_deref());

        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                protocol = negotiated_version,
                "Client initialised"
            );
        }

        self.protocol_version = Some(negotiated_version.to_string());
        self.client_info = params.client_info;
        self.state = EngineState::Ready;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let result = json!({
            "tools": self.registry.definitions(),
        });

        JsonRpcResponse::success(req.id.clone(), result)
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(
        &self,
        req: &JsonRpcRequest,
        token: Option<&str>,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let params: ToolCallParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid tool call params: {e}"),
                )
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing tool call params")
            })?;

        tracing::debug!(tool = %params.name, "Tool call");

        let outcome = self
            .registry
            .dispatch(&params.name, &params.arguments, token)
            .await
            .map_err(|e: ToolError| JsonRpcError::invalid_params(req.id.clone(), e.to_string()))?;

        let result = ToolCallResult::from(outcome);
        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Ensures the engine is in the Ready state.
    fn require_ready(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != EngineState::Ready {
            return Err(JsonRpcError::no_session(
                Some(id.clone()),
                "Server not initialised",
            ));
        }
        Ok(())
    }
}

/// Echoes a supported client version, otherwise the server default.
fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(MCP_PROTOCOL_VERSION)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::UpstreamError;
    use crate::mcp::protocol::{parse_message, NO_SESSION_CODE};
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

    fn engine() -> McpEngine {
        let registry = ToolRegistry::with_catalogue(Arc::new(Empty)).unwrap();
        McpEngine::new(Arc::new(registry))
    }

    fn request(json: &str) -> JsonRpcRequest {
        match parse_message(json).unwrap() {
            IncomingMessage::Request(req) => req,
            IncomingMessage::Notification(_) => panic!("expected request"),
        }
    }

    async fn initialise(engine: &mut McpEngine) {
        engine
            .handle_request(
                &request(r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#),
                None,
            )
            .await
            .unwrap();
    }

    #[test]
    fn engine_initial_state() {
        let engine = engine();
        assert_eq!(engine.state(), EngineState::Uninitialised);
        assert!(engine.protocol_version().is_none());
    }

    #[test]
    fn version_negotiation() {
        assert_eq!(negotiate_version(Some("2025-03-26")), "2025-03-26");
        assert_eq!(negotiate_version(Some("1999-01-01")), MCP_PROTOCOL_VERSION);
        assert_eq!(negotiate_version(None), MCP_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn initialize_moves_to_ready() {
        let mut engine = engine();
        let resp = engine
            .handle_request(
                &request(
                    r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","clientInfo":{"name":"inspector"}}}"#,
                ),
                None,
            )
            .await
            .unwrap();

        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(resp.result["protocolVersion"], "2025-03-26");
        assert_eq!(resp.result["capabilities"], json!({"tools": {}}));
        assert_eq!(resp.result["serverInfo"]["name"], "FinanceMCP-DCTHS");
        assert_eq!(engine.client_info().map(|c| c.name.as_str()), Some("inspector"));
    }

    #[tokio::test]
    async fn malformed_initialize_params_rejected() {
        let mut engine = engine();
        let err = engine
            .handle_request(
                &request(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":5}}"#),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), -32602);
        assert_eq!(engine.state(), EngineState::Uninitialised);
    }

    #[tokio::test]
    async fn requests_before_initialize_rejected() {
        let mut engine = engine();
        let err = engine
            .handle_request(&request(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), NO_SESSION_CODE);
        assert_eq!(err.id, Some(RequestId::Number(2)));
    }

    #[tokio::test]
    async fn tools_list_returns_catalogue() {
        let mut engine = engine();
        initialise(&mut engine).await;

        let resp = engine
            .handle_request(&request(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#), None)
            .await
            .unwrap();
        let tools = resp.result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 9);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let mut engine = engine();
        initialise(&mut engine).await;

        let err = engine
            .handle_request(&request(r#"{"jsonrpc":"2.0","id":"x","method":"resources/list"}"#), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32601);
        assert_eq!(err.id, Some(RequestId::String("x".to_string())));
    }

    #[tokio::test]
    async fn tools_call_without_params_is_invalid() {
        let mut engine = engine();
        initialise(&mut engine).await;

        let err = engine
            .handle_request(&request(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call"}"#), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn empty_result_renders_no_data() {
        let mut engine = engine();
        initialise(&mut engine).await;

        let resp = engine
            .handle_request(
                &request(
                    r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"get_ths_index","arguments":{}}}"#,
                ),
                None,
            )
            .await
            .unwrap();
        assert_eq!(resp.result["content"][0]["type"], "text");
        assert!(resp.result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("暂无数据"));
        assert!(resp.result.get("isError").is_none());
    }

    #[tokio::test]
    async fn notifications_produce_no_reply() {
        let mut engine = engine();
        let msg = parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(engine.handle_message(msg, None).await.is_none());

        let msg = parse_message(r#"{"jsonrpc":"2.0","id":null,"method":"tools/list"}"#).unwrap();
        assert!(engine.handle_message(msg, None).await.is_none());
    }

    #[tokio::test]
    async fn ping_after_initialize() {
        let mut engine = engine();
        initialise(&mut engine).await;
        let resp = engine
            .handle_request(&request(r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#), None)
            .await
            .unwrap();
        assert_eq!(resp.result, json!({}));
    }
}
