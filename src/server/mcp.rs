//! MCP protocol over stdio: newline-delimited JSON-RPC 2.0.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// Name reported in the initialize handshake.
pub const SERVER_NAME: &str = "tot-reasoning";

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes used by this server.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// JSON-RPC 2.0 request. `id` is absent for notifications.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response. Exactly one of `result` / `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Null when the request id could not be determined.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of a tool invocation. Tool failures are reported here with
/// `isError`, not as JSON-RPC errors.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error: is_error.then_some(true),
        }
    }
}

/// MCP server reading requests from stdin and answering on stdout.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve until stdin reaches EOF.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Tree-of-Thoughts MCP server listening on stdio");

        let mut reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("EOF received, shutting down");
                break;
            }

            if let Some(response) = self.process_line(&line).await {
                let encoded = serde_json::to_string(&response)?;
                debug!(response = %encoded, "Sending response");
                stdout.write_all(encoded.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle one raw input line. `None` means nothing should be written back.
    pub async fn process_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        debug!(request = %trimmed, "Received request");

        match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                error!(error = %e, "Failed to parse request");
                Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    /// Dispatch a parsed request. Notifications never get a response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(request.id, initialize_result())),
            "initialized" | "notifications/initialized" | "notifications/cancelled" => {
                debug!(method = %request.method, "Notification received");
                None
            }
            "ping" => Some(JsonRpcResponse::success(request.id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(
                request.id,
                json!({ "tools": all_tools() }),
            )),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            method if is_notification => {
                debug!(method = %method, "Unknown notification, ignoring");
                None
            }
            method => {
                error!(method = %method, "Unknown method");
                Some(JsonRpcResponse::error(
                    request.id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                ))
            }
        }
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params.map(serde_json::from_value) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
            None => return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "Missing params"),
        };

        info!(tool = %params.name, "Handling tool call");

        let result = match handle_tool_call(&self.state, &params.name, params.arguments).await {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => ToolCallResult::text(text, false),
                Err(e) => ToolCallResult::text(format!("Error: serialization failed: {}", e), true),
            },
            Err(e) => {
                error!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::text(format!("Error: {}", e), true)
            }
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(
                id,
                error_codes::INTERNAL_ERROR,
                format!("Internal error: {}", e),
            ),
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// Shared schema fragment for session config overrides.
fn config_schema() -> Value {
    json!({
        "type": "object",
        "description": "Overrides for the server's default search configuration",
        "properties": {
            "max_depth": {"type": "integer", "minimum": 1},
            "branching_factor": {"type": "integer", "minimum": 1},
            "search_strategy": {
                "type": "string",
                "enum": ["breadth-first", "depth-first", "best-first"]
            },
            "evaluation_method": {
                "type": "string",
                "enum": ["value", "vote", "confidence"]
            },
            "pruning_threshold": {"type": "number", "minimum": 0, "maximum": 1}
        }
    })
}

fn session_id_schema() -> Value {
    json!({"type": "string", "description": "Session identifier"})
}

/// Every tool this server exposes, in listing order.
pub fn all_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "reasoning_tot",
            "Solve a problem with Tree-of-Thoughts search: start a session, explore candidate thoughts, select the best path, and return a synthesized plan with confidence and alternatives.",
            json!({
                "type": "object",
                "properties": {
                    "problem": {"type": "string", "description": "Problem statement to reason about"},
                    "session_id": session_id_schema(),
                    "config": config_schema(),
                    "timeout_ms": {"type": "integer", "minimum": 0, "description": "Wall-clock budget for exploration"}
                },
                "required": ["problem"]
            }),
        ),
        Tool::new(
            "reasoning_tot_start",
            "Create a Tree-of-Thoughts session rooted at a problem. Reusing an id resets that session.",
            json!({
                "type": "object",
                "properties": {
                    "problem": {"type": "string"},
                    "session_id": session_id_schema(),
                    "config": config_schema()
                },
                "required": ["problem"]
            }),
        ),
        Tool::new(
            "reasoning_tot_expand",
            "Generate and score children for one node. Expanding an already expanded node returns its existing children.",
            json!({
                "type": "object",
                "properties": {
                    "session_id": session_id_schema(),
                    "node_id": {"type": "string", "description": "Node to expand, e.g. node-0 for the root"}
                },
                "required": ["session_id", "node_id"]
            }),
        ),
        Tool::new(
            "reasoning_tot_evaluate",
            "Re-score nodes and store the new values.",
            json!({
                "type": "object",
                "properties": {
                    "session_id": session_id_schema(),
                    "node_ids": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["session_id", "node_ids"]
            }),
        ),
        Tool::new(
            "reasoning_tot_select",
            "Select the greedy best root-to-leaf path of a session.",
            json!({
                "type": "object",
                "properties": {"session_id": session_id_schema()},
                "required": ["session_id"]
            }),
        ),
        Tool::new(
            "reasoning_tot_visualize",
            "Return a session's tree as nested nodes with values and selection flags.",
            json!({
                "type": "object",
                "properties": {"session_id": session_id_schema()},
                "required": ["session_id"]
            }),
        ),
        Tool::new(
            "reasoning_tot_delete",
            "Delete a session and its tree.",
            json!({
                "type": "object",
                "properties": {"session_id": session_id_schema()},
                "required": ["session_id"]
            }),
        ),
        Tool::new(
            "reasoning_tot_list",
            "List stored sessions, oldest first.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}
