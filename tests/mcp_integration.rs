//! Integration tests for MCP protocol handling.
//!
//! These tests verify JSON-RPC 2.0 parsing and the engine lifecycle against
//! an in-process data provider: tool dispatch, parameter forwarding, token
//! passing and failure reporting.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use finance_mcp::error::UpstreamError;
use finance_mcp::mcp::protocol::{parse_message, IncomingMessage, JsonRpcRequest, RequestId};
use finance_mcp::mcp::McpEngine;
use finance_mcp::tools::ToolRegistry;
use finance_mcp::tushare::{format_data, DataProvider, QueryParams, Record};

// =============================================================================
// Test Providers
// =============================================================================

/// One recorded upstream call.
#[derive(Debug, Clone)]
struct Call {
    token: Option<String>,
    api_name: String,
    params: QueryParams,
}

/// Records calls and answers with canned columnar data.
struct Recording {
    calls: Mutex<Vec<Call>>,
    data: Value,
}

impl Recording {
    fn new(data: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            data,
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataProvider for Recording {
    async fn query(
        &self,
        token: Option<&str>,
        api_name: &str,
        params: &QueryParams,
    ) -> Result<Vec<Record>, UpstreamError> {
        self.calls.lock().unwrap().push(Call {
            token: token.map(str::to_owned),
            api_name: api_name.to_string(),
            params: params.clone(),
        });
        Ok(format_data(&self.data))
    }
}

/// Always fails like a rejected upstream call.
struct Failing;

#[async_trait]
impl DataProvider for Failing {
    async fn query(
        &self,
        _token: Option<&str>,
        _api_name: &str,
        _params: &QueryParams,
    ) -> Result<Vec<Record>, UpstreamError> {
        Err(UpstreamError::Api {
            code: 40203,
            message: "抱歉，您没有访问该接口的权限".to_string(),
        })
    }
}

fn request(json: Value) -> JsonRpcRequest {
    match parse_message(&json.to_string()).unwrap() {
        IncomingMessage::Request(req) => req,
        IncomingMessage::Notification(_) => panic!("Expected Request"),
    }
}

async fn ready_engine(provider: Arc<dyn DataProvider>) -> McpEngine {
    let registry = ToolRegistry::with_catalogue(provider).unwrap();
    let mut engine = McpEngine::new(Arc::new(registry));
    engine
        .handle_request(
            &request(json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}})),
            None,
        )
        .await
        .unwrap();
    engine
}

fn call(id: i64, name: &str, arguments: Value) -> JsonRpcRequest {
    request(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    }))
}

fn text_of(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, RequestId::Number(1));
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_notification() {
    let json = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }"#;

    if let IncomingMessage::Notification(notif) = parse_message(json).unwrap() {
        assert_eq!(notif.method, "notifications/initialized");
    } else {
        panic!("Expected Notification");
    }
}

#[test]
fn test_null_id_is_notification() {
    let json = r#"{"jsonrpc": "2.0", "id": null, "method": "notifications/cancelled"}"#;
    assert!(matches!(
        parse_message(json).unwrap(),
        IncomingMessage::Notification(_)
    ));
}

#[test]
fn test_parse_invalid_json() {
    let error = parse_message("not valid json").unwrap_err();
    assert_eq!(error.code(), -32700);
}

#[test]
fn test_parse_missing_jsonrpc_version() {
    let json = r#"{
        "id": 1,
        "method": "test"
    }"#;

    let error = parse_message(json).unwrap_err();
    assert_eq!(error.code(), -32600);
}

// =============================================================================
// Tool Call Tests
// =============================================================================

#[tokio::test]
async fn test_upstream_failure_is_tool_error() {
    let engine_provider: Arc<dyn DataProvider> = Arc::new(Failing);
    let mut engine = ready_engine(engine_provider).await;

    let resp = engine
        .handle_request(
            &call(1, "get_stock_moneyflow", json!({"ts_code": "000001.SZ", "data_source": "dongcai"})),
            None,
        )
        .await
        .unwrap();

    assert_eq!(resp.result["isError"], true);
    let text = text_of(&resp.result);
    assert!(text.starts_with("❌ 查询失败"));
    assert!(text.contains("没有访问该接口的权限"));
    assert!(text.contains("请检查："));
}

#[tokio::test]
async fn test_unknown_tool_is_protocol_error() {
    let mut engine = ready_engine(Arc::new(Failing)).await;

    let err = engine
        .handle_request(&call(2, "get_weather", json!({})), None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), -32602);
    assert_eq!(err.error.message, "Unknown tool: get_weather");
    assert_eq!(err.id, Some(RequestId::Number(2)));
}

#[tokio::test]
async fn test_data_source_selects_api_and_is_not_forwarded() {
    let provider = Recording::new(json!({
        "fields": ["ts_code", "name", "net_amount"],
        "items": [["000001.SZ", "平安银行", 1234.5]]
    }));
    let mut engine = ready_engine(provider.clone()).await;

    let resp = engine
        .handle_request(
            &call(
                3,
                "get_stock_moneyflow",
                json!({"ts_code": "000001.SZ", "trade_date": "20240105", "data_source": "tonghuashun"}),
            ),
            Some("per-request-token"),
        )
        .await
        .unwrap();

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].api_name, "moneyflow_hsgt");
    assert_eq!(calls[0].token.as_deref(), Some("per-request-token"));
    assert_eq!(calls[0].params.len(), 2);
    assert_eq!(calls[0].params["ts_code"], "000001.SZ");
    assert_eq!(calls[0].params["trade_date"], "20240105");

    let text = text_of(&resp.result);
    assert!(text.starts_with("📊 个股资金流向查询结果\n\n数据源：同花顺\n"));
    assert!(text.contains("查询条件：000001.SZ 20240105"));
    assert!(text.contains("共 1 条数据，显示前 1 条"));
    assert!(text.contains("### 1. 000001.SZ"));
    assert!(text.contains("- **net_amount**: 1234.5"));
}

#[tokio::test]
async fn test_missing_data_source_never_calls_upstream() {
    let provider = Recording::new(json!({"fields": [], "items": []}));
    let mut engine = ready_engine(provider.clone()).await;

    let resp = engine
        .handle_request(&call(4, "get_block_member", json!({"block_code": "BK0001"})), None)
        .await
        .unwrap();

    assert_eq!(resp.result["isError"], true);
    assert!(text_of(&resp.result).contains("data_source"));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_display_cap_truncates_report() {
    let items: Vec<Value> = (0..25)
        .map(|i| json!([format!("88{i:04}.TI"), "20240105", 1.0]))
        .collect();
    let provider = Recording::new(json!({
        "fields": ["ts_code", "trade_date", "pct_change"],
        "items": items
    }));
    let mut engine = ready_engine(provider).await;

    let resp = engine
        .handle_request(&call(5, "get_ths_daily", json!({})), None)
        .await
        .unwrap();

    let text = text_of(&resp.result);
    assert!(text.contains("查询条件：全部\n"));
    assert!(text.contains("共 25 条数据，显示前 20 条"));
    assert_eq!(text.matches("### ").count(), 20);
}

#[tokio::test]
async fn test_dc_index_template_lines() {
    let provider = Recording::new(json!({
        "fields": ["ts_code", "trade_date", "name", "leading", "leading_code", "pct_change", "leading_pct", "total_mv", "turnover_rate", "up_num", "down_num"],
        "items": [["BK1184.DC", "20240105", "人形机器人", "某股份", "600000.SH", 2.5, 10.01, 123_456.0, 3.2, 40, 8]]
    }));
    let mut engine = ready_engine(provider).await;

    let resp = engine
        .handle_request(&call(6, "get_dc_index", json!({"name": "人形机器人"})), None)
        .await
        .unwrap();

    let text = text_of(&resp.result);
    assert!(text.contains("查询条件：人形机器人\n"));
    assert!(text.contains("### 1. 人形机器人 (BK1184.DC) - 20240105"));
    assert!(text.contains("- **涨跌幅**: 2.5%"));
    assert!(text.contains("- **领涨股**: 某股份 (600000.SH)"));
    assert!(text.contains("- **上涨家数**: 40"));
}

#[tokio::test]
async fn test_tools_list_is_stable() {
    let mut engine = ready_engine(Arc::new(Failing)).await;
    let list = request(json!({"jsonrpc": "2.0", "id": 9, "method": "tools/list"}));

    let first = engine.handle_request(&list, None).await.unwrap();
    let second = engine.handle_request(&list, None).await.unwrap();
    assert_eq!(first.result, second.result);

    let names: Vec<&str> = first.result["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "get_stock_moneyflow",
            "get_block_moneyflow",
            "get_block_member",
            "get_ths_index",
            "get_ths_daily",
            "get_ths_member",
            "get_dc_index",
            "get_dc_daily",
            "get_dc_member",
        ]
    );
}
