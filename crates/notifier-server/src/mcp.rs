//! MCP (Model Context Protocol) server implementation.
//!
//! Implements the MCP JSON-RPC 2.0 protocol over HTTP, exposing the
//! registered notification adapters as MCP tools. Supports the
//! `initialize`, `ping`, `tools/list`, and `tools/call` methods, plus
//! batch requests.
//!
//! The MCP specification version targeted is `2024-11-05`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use notifier_adapters::{Adapter, AdapterError};

use crate::state::AppState;

/// The MCP protocol version this server implements.
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// The server name reported during initialization.
const SERVER_NAME: &str = "notifier";

/// The server version reported during initialization.
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// JSON-RPC types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be `"2.0"`.
    pub jsonrpc: String,
    /// Request identifier. May be a number, string, or null for
    /// notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// The method to invoke.
    pub method: String,
    /// Method parameters (defaults to `null` if absent).
    #[serde(default)]
    pub params: Value,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echoed from the request.
    pub id: Option<Value>,
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (negative numbers are reserved by JSON-RPC).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes.
const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

impl JsonRpcResponse {
    /// Construct a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Construct an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MCP-specific types
// ---------------------------------------------------------------------------

/// An MCP tool definition returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    /// The machine-readable tool name.
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The result of an MCP `tools/call` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    /// The content blocks returned by the tool.
    pub content: Vec<McpContent>,
    /// Whether the tool call resulted in an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// A single content block within an MCP tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpContent {
    /// The content type (e.g. `"text"`).
    #[serde(rename = "type")]
    pub content_type: String,
    /// The textual content.
    pub text: String,
}

impl McpContent {
    /// Create a text content block.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            content_type: "text".into(),
            text: value.into(),
        }
    }
}

impl McpToolResult {
    /// Create a successful tool result with a single text block.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::text(text)],
            is_error: None,
        }
    }

    /// Create an error tool result with a single text block.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::text(text)],
            is_error: Some(true),
        }
    }
}

// ---------------------------------------------------------------------------
// McpServer
// ---------------------------------------------------------------------------

/// MCP protocol server that exposes adapters as tools.
pub struct McpServer {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl McpServer {
    /// Create a new MCP server backed by the given adapters.
    pub fn new(adapters: Vec<Arc<dyn Adapter>>) -> Self {
        Self { adapters }
    }

    /// Handle a single JSON-RPC request and return a response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "MCP request received");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            other => {
                tracing::warn!(method = %other, "unknown MCP method");
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                )
            }
        }
    }

    /// Handle the `initialize` handshake.
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    /// Handle `tools/list` by collecting tool definitions from all adapters.
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = self.list_tools();
        match serde_json::to_value(&tools) {
            Ok(tools_value) => JsonRpcResponse::success(id, json!({ "tools": tools_value })),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize tool list");
                JsonRpcResponse::error(id, INTERNAL_ERROR, "failed to serialize tool list")
            }
        }
    }

    /// Handle `tools/call` by dispatching to the adapter that owns the tool.
    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_owned(),
            None => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "missing required field `name` in params",
                );
            }
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let result = self.call_tool(&name, arguments).await;
        match serde_json::to_value(&result) {
            Ok(v) => JsonRpcResponse::success(id, v),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize tool result");
                JsonRpcResponse::error(id, INTERNAL_ERROR, "failed to serialize tool result")
            }
        }
    }

    /// Build the tool list from all adapters.
    fn list_tools(&self) -> Vec<McpToolDefinition> {
        self.adapters
            .iter()
            .flat_map(|adapter| {
                adapter.tools().into_iter().map(|t| McpToolDefinition {
                    name: t.name,
                    description: t.description,
                    input_schema: t.parameters,
                })
            })
            .collect()
    }

    /// Execute a tool call by finding the adapter that owns the tool.
    ///
    /// Every adapter failure, including unknown tools and rejected
    /// parameters, is rendered as an `isError` tool result; only a
    /// malformed request envelope becomes a JSON-RPC error.
    async fn call_tool(&self, name: &str, arguments: Value) -> McpToolResult {
        let adapter = self
            .adapters
            .iter()
            .find(|a| a.tools().iter().any(|t| t.name == name));

        let adapter = match adapter {
            Some(a) => a,
            None => return McpToolResult::error(format!("unknown tool: {name}")),
        };

        match adapter.execute_tool(name, arguments).await {
            Ok(value) => {
                let text = match value {
                    Value::String(s) => s,
                    other => {
                        serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string())
                    }
                };
                McpToolResult::success(text)
            }
            Err(AdapterError::InvalidParams { tool_name, reason }) => {
                McpToolResult::error(format!("invalid params for `{tool_name}`: {reason}"))
            }
            Err(e) => McpToolResult::error(format!("tool execution failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Axum handler
// ---------------------------------------------------------------------------

/// Handle `POST /mcp`.
///
/// The body is either a single JSON-RPC request object or an array of
/// request objects (batch mode).
pub async fn handle_mcp_request(State(state): State<Arc<AppState>>, body: String) -> Json<Value> {
    let mcp = McpServer::new(state.adapters.clone());

    // Try to parse as a batch first, then as a single request.
    if let Ok(batch) = serde_json::from_str::<Vec<JsonRpcRequest>>(&body) {
        if batch.is_empty() {
            return Json(json!(JsonRpcResponse::error(
                None,
                INVALID_REQUEST,
                "empty batch request",
            )));
        }
        let mut responses = Vec::with_capacity(batch.len());
        for req in batch {
            responses.push(mcp.handle_request(req).await);
        }
        return Json(json!(responses));
    }

    match serde_json::from_str::<JsonRpcRequest>(&body) {
        Ok(request) => {
            let response = mcp.handle_request(request).await;
            Json(json!(response))
        }
        Err(e) => Json(json!(JsonRpcResponse::error(
            None,
            PARSE_ERROR,
            format!("failed to parse JSON-RPC request: {e}"),
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notifier_adapters::{
        AdapterType, AuthRequirement, HealthStatus, ToolDefinition,
    };

    /// Stand-in notification adapter with scripted tool behavior.
    struct FakeNotifier {
        id: String,
        tool_defs: Vec<ToolDefinition>,
    }

    #[async_trait]
    impl Adapter for FakeNotifier {
        fn id(&self) -> &str {
            &self.id
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Messaging
        }

        async fn connect(&mut self) -> notifier_adapters::Result<()> {
            Ok(())
        }

        async fn disconnect(&mut self) -> notifier_adapters::Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> notifier_adapters::Result<HealthStatus> {
            Ok(HealthStatus::Healthy)
        }

        fn tools(&self) -> Vec<ToolDefinition> {
            self.tool_defs.clone()
        }

        async fn execute_tool(
            &self,
            name: &str,
            params: Value,
        ) -> notifier_adapters::Result<Value> {
            match name {
                "send_note" => Ok(json!({"success": true, "delivered": true})),
                "send_broken" => Ok(json!({"success": false, "error": "relay unreachable"})),
                "send_strict" => {
                    if params.get("target").is_none() {
                        return Err(AdapterError::InvalidParams {
                            tool_name: name.to_owned(),
                            reason: "missing required string field `target`".into(),
                        });
                    }
                    Ok(json!({"success": true}))
                }
                _ => Err(AdapterError::ToolNotFound {
                    adapter_id: self.id.clone(),
                    tool_name: name.to_owned(),
                }),
            }
        }

        fn required_auth(&self) -> Option<AuthRequirement> {
            None
        }
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_owned(),
            description: format!("Test tool {name}"),
            parameters: json!({
                "type": "object",
                "properties": {
                    "target": { "type": "string" }
                },
                "required": []
            }),
        }
    }

    fn fake_adapters() -> Vec<Arc<dyn Adapter>> {
        vec![Arc::new(FakeNotifier {
            id: "fake".into(),
            tool_defs: vec![tool("send_note"), tool("send_broken"), tool("send_strict")],
        })]
    }

    fn request(id: Value, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    #[test]
    fn request_parses_without_params() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": "abc", "method": "ping"}"#).unwrap();
        assert_eq!(req.method, "ping");
        assert!(req.params.is_null());
    }

    #[test]
    fn success_response_omits_error_field() {
        let resp = JsonRpcResponse::success(Some(json!(1)), json!({"ok": true}));
        let serialized = serde_json::to_value(&resp).unwrap();
        assert_eq!(serialized["jsonrpc"], "2.0");
        assert_eq!(serialized["result"]["ok"], true);
        assert!(serialized.get("error").is_none());
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_server_info() {
        let server = McpServer::new(vec![]);
        let resp = server
            .handle_request(request(
                json!(1),
                "initialize",
                json!({"protocolVersion": "2024-11-05", "capabilities": {}}),
            ))
            .await;

        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn ping_returns_empty_object() {
        let server = McpServer::new(vec![]);
        let resp = server.handle_request(request(json!(2), "ping", json!(null))).await;
        assert_eq!(resp.result.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn tools_list_flattens_adapter_tools() {
        let server = McpServer::new(fake_adapters());
        let resp = server
            .handle_request(request(json!(3), "tools/list", json!(null)))
            .await;

        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        for t in tools {
            assert!(t.get("name").is_some());
            assert!(t.get("inputSchema").is_some());
        }
    }

    #[tokio::test]
    async fn tools_call_wraps_result_as_text_content() {
        let server = McpServer::new(fake_adapters());
        let resp = server
            .handle_request(request(
                json!(4),
                "tools/call",
                json!({"name": "send_note", "arguments": {}}),
            ))
            .await;

        let result = resp.result.unwrap();
        assert!(result.get("isError").is_none());
        assert_eq!(result["content"][0]["type"], "text");
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("delivered"));
    }

    #[tokio::test]
    async fn failed_tool_payload_still_flows_through_as_success() {
        // A `{"success": false}` payload is a valid tool result, not a
        // protocol error.
        let server = McpServer::new(fake_adapters());
        let resp = server
            .handle_request(request(
                json!(5),
                "tools/call",
                json!({"name": "send_broken", "arguments": {}}),
            ))
            .await;

        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert!(result.get("isError").is_none());
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("relay unreachable"));
    }

    #[tokio::test]
    async fn invalid_tool_params_are_an_error_result() {
        // Rejected parameters stay inside the tool result; the JSON-RPC
        // envelope itself succeeds.
        let server = McpServer::new(fake_adapters());
        let resp = server
            .handle_request(request(
                json!(6),
                "tools/call",
                json!({"name": "send_strict", "arguments": {}}),
            ))
            .await;

        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("invalid params"));
        assert!(text.contains("target"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let server = McpServer::new(fake_adapters());
        let resp = server
            .handle_request(request(
                json!(7),
                "tools/call",
                json!({"name": "no_such_tool", "arguments": {}}),
            ))
            .await;

        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("unknown tool"));
    }

    #[tokio::test]
    async fn missing_name_param_is_invalid_params() {
        let server = McpServer::new(fake_adapters());
        let resp = server
            .handle_request(request(json!(8), "tools/call", json!({"arguments": {}})))
            .await;

        let err = resp.error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("name"));
    }

    #[tokio::test]
    async fn missing_arguments_default_to_empty_object() {
        let server = McpServer::new(fake_adapters());
        let resp = server
            .handle_request(request(json!(9), "tools/call", json!({"name": "send_note"})))
            .await;
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let server = McpServer::new(vec![]);
        let resp = server
            .handle_request(request(json!(10), "notifications/poke", json!(null)))
            .await;

        let err = resp.error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert!(err.message.contains("notifications/poke"));
    }

    #[tokio::test]
    async fn batch_requests_answer_in_order() {
        let server = McpServer::new(fake_adapters());
        let batch = vec![
            request(json!(1), "ping", json!(null)),
            request(json!(2), "tools/list", json!(null)),
            request(json!(3), "bogus", json!(null)),
        ];

        let mut responses = Vec::new();
        for req in batch {
            responses.push(server.handle_request(req).await);
        }

        assert_eq!(responses[0].id, Some(json!(1)));
        assert!(responses[0].error.is_none());
        assert!(responses[1].error.is_none());
        assert_eq!(responses[2].error.as_ref().unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notification_without_id_echoes_null_id() {
        let server = McpServer::new(vec![]);
        let resp = server
            .handle_request(JsonRpcRequest {
                jsonrpc: "2.0".into(),
                id: None,
                method: "ping".into(),
                params: json!(null),
            })
            .await;
        assert_eq!(resp.id, None);
    }

    #[test]
    fn parse_error_shape() {
        let err = serde_json::from_str::<JsonRpcRequest>("not json").unwrap_err();
        let resp = JsonRpcResponse::error(
            None,
            PARSE_ERROR,
            format!("failed to parse JSON-RPC request: {err}"),
        );
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[test]
    fn tool_result_serialization() {
        let ok = McpToolResult::success("done");
        let serialized = serde_json::to_value(&ok).unwrap();
        assert_eq!(serialized["content"][0]["type"], "text");
        assert!(serialized.get("isError").is_none());

        let failed = McpToolResult::error("boom");
        let serialized = serde_json::to_value(&failed).unwrap();
        assert_eq!(serialized["isError"], true);
    }
}
