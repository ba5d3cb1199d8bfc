// precedent-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: JSON-RPC 2.0 server over stdio and HTTP transports.
// Purpose: Expose Precedent tools and resources to agent runtimes.
// Dependencies: precedent-service, axum, tokio
// ============================================================================

//! ## Overview
//! The server speaks JSON-RPC 2.0: `initialize` (returning the
//! check-before/trace-after instructions), `tools/list`, `tools/call`,
//! `resources/list`, and `resources/read`. The stdio transport supports
//! server-initiated `roots/list` requests with a three-second deadline;
//! the HTTP transport authenticates each request by bearer token and
//! reports roots as unsupported. Tool handlers run through
//! `tokio::task::block_in_place` so the synchronous engine never stalls
//! the async runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use precedent_core::AgentKey;
use precedent_core::OrgId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::roots::NoopRootsClient;
use crate::roots::RootsClient;
use crate::tools::RequestContext;
use crate::tools::ToolCallResult;
use crate::tools::ToolContent;
use crate::tools::ToolError;
use crate::tools::ToolRouter;
use crate::tools::tool_definitions;

/// Protocol version advertised in the handshake.
const PROTOCOL_VERSION: &str = "2025-03-26";
/// Deadline for `roots/list` round trips to the client.
const ROOTS_TIMEOUT: Duration = Duration::from_secs(3);

/// Workflow instructions delivered in the handshake.
const INSTRUCTIONS: &str = "Precedent is a shared decision trace store. Before making a \
                            significant decision, call `check` with the decision_type (and a \
                            short query) to find precedents and conflicts. After deciding, call \
                            `trace` with the decision_type, outcome, confidence, reasoning, \
                            alternatives you rejected, and supporting evidence, citing a \
                            precedent_ref from `check` where one applies. Use `assess` to record \
                            whether earlier decisions held up.";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Transport failure.
    #[error("mcp transport failure: {0}")]
    Transport(String),
    /// Configuration failure.
    #[error("mcp config invalid: {0}")]
    Config(String),
}

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default)]
    id: Option<Value>,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable message.
    message: String,
}

/// Tool call parameters.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Resource read parameters.
#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    /// Resource URI.
    uri: String,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Tool router for request dispatch.
    router: Arc<ToolRouter>,
    /// Identity bound to the stdio transport, when configured.
    stdio_identity: Option<(OrgId, AgentKey)>,
    /// JWT secret for HTTP bearer verification.
    jwt_secret: Vec<u8>,
}

impl McpServer {
    /// Creates the server.
    #[must_use]
    pub fn new(
        router: Arc<ToolRouter>,
        stdio_identity: Option<(OrgId, AgentKey)>,
        jwt_secret: Vec<u8>,
    ) -> Self {
        Self {
            router,
            stdio_identity,
            jwt_secret,
        }
    }

    /// Serves JSON-RPC over stdin/stdout until EOF.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] on unrecoverable transport failures.
    pub fn serve_stdio(&self) -> Result<(), McpServerError> {
        let session = Arc::new(StdioSession::start());
        let context = match &self.stdio_identity {
            Some((org_id, agent)) => {
                RequestContext::authenticated("stdio".to_string(), *org_id, agent.clone())
            }
            None => RequestContext::anonymous("stdio".to_string()),
        };
        loop {
            let Some(message) = session.next_message() else {
                return Ok(());
            };
            let Ok(request) = serde_json::from_value::<JsonRpcRequest>(message) else {
                session.write(&json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32700, "message": "parse error" },
                }))?;
                continue;
            };
            let Some(response) = handle_request(&self.router, &context, session.as_ref(), request)
            else {
                continue;
            };
            let payload = serde_json::to_value(&response)
                .map_err(|_| McpServerError::Transport("response serialization".to_string()))?;
            session.write(&payload)?;
        }
    }

    /// Serves JSON-RPC over HTTP on the given bind address.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the listener fails.
    pub async fn serve_http(&self, bind: &str) -> Result<(), McpServerError> {
        let addr: SocketAddr = bind
            .parse()
            .map_err(|_| McpServerError::Config(format!("invalid bind address {bind}")))?;
        let state = Arc::new(HttpState {
            router: Arc::clone(&self.router),
            jwt_secret: self.jwt_secret.clone(),
        });
        let app = Router::new().route("/rpc", post(handle_http)).with_state(state);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| McpServerError::Transport(format!("bind failed: {err}")))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| McpServerError::Transport(format!("serve failed: {err}")))
    }
}

// ============================================================================
// SECTION: Stdio Session
// ============================================================================

/// Shared state for the stdio transport: a reader thread feeding a
/// channel, a locked writer, and a queue for messages consumed out of
/// order while waiting for a roots response.
struct StdioSession {
    /// Parsed messages from the reader thread.
    incoming: Mutex<mpsc::Receiver<Value>>,
    /// Writer half of the transport.
    writer: Mutex<std::io::Stdout>,
    /// Messages set aside while awaiting a response.
    parked: Mutex<VecDeque<Value>>,
    /// Server-initiated request id source (negative to avoid collisions).
    next_request_id: AtomicI64,
}

impl StdioSession {
    /// Starts the reader thread and builds the session.
    fn start() -> Self {
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let reader = BufReader::new(std::io::stdin());
            for line in reader.lines() {
                let Ok(line) = line else {
                    return;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(value) = serde_json::from_str::<Value>(&line) else {
                    continue;
                };
                if sender.send(value).is_err() {
                    return;
                }
            }
        });
        Self {
            incoming: Mutex::new(receiver),
            writer: Mutex::new(std::io::stdout()),
            parked: Mutex::new(VecDeque::new()),
            next_request_id: AtomicI64::new(-1),
        }
    }

    /// Returns the next message, draining parked messages first.
    fn next_message(&self) -> Option<Value> {
        if let Ok(mut parked) = self.parked.lock() {
            if let Some(message) = parked.pop_front() {
                return Some(message);
            }
        }
        self.incoming.lock().ok()?.recv().ok()
    }

    /// Writes one JSON line to stdout.
    fn write(&self, payload: &Value) -> Result<(), McpServerError> {
        let Ok(mut writer) = self.writer.lock() else {
            return Err(McpServerError::Transport("stdout lock poisoned".to_string()));
        };
        writeln!(writer, "{payload}")
            .and_then(|()| writer.flush())
            .map_err(|err| McpServerError::Transport(err.to_string()))
    }
}

impl RootsClient for StdioSession {
    fn list_roots(&self) -> Option<Vec<String>> {
        let id = self.next_request_id.fetch_sub(1, Ordering::Relaxed);
        let request = json!({ "jsonrpc": "2.0", "id": id, "method": "roots/list" });
        self.write(&request).ok()?;
        let deadline = Instant::now() + ROOTS_TIMEOUT;
        let receiver = self.incoming.lock().ok()?;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let message = receiver.recv_timeout(remaining).ok()?;
            let is_reply = message.get("id").and_then(Value::as_i64) == Some(id)
                && message.get("method").is_none();
            if !is_reply {
                if let Ok(mut parked) = self.parked.lock() {
                    parked.push_back(message);
                }
                continue;
            }
            let roots = message
                .get("result")
                .and_then(|result| result.get("roots"))
                .and_then(Value::as_array)?
                .iter()
                .filter_map(|root| root.get("uri").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect();
            return Some(roots);
        }
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared state for the HTTP transport.
struct HttpState {
    /// Tool router for request dispatch.
    router: Arc<ToolRouter>,
    /// JWT secret for bearer verification.
    jwt_secret: Vec<u8>,
}

/// Handles one HTTP JSON-RPC request.
async fn handle_http(
    State(state): State<Arc<HttpState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let session_id = headers
        .get("mcp-session-id")
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| peer.to_string(), ToString::to_string);
    let identity = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .and_then(|token| precedent_service::token::verify(&state.jwt_secret, token).ok())
        .map(|claims| (claims.org, claims.agent_key()));
    let context = match identity {
        Some((org_id, agent)) => RequestContext::authenticated(session_id, org_id, agent),
        None => RequestContext::anonymous(session_id),
    };
    let Ok(request) = serde_json::from_slice::<JsonRpcRequest>(&bytes) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": { "code": -32700, "message": "parse error" },
            })),
        );
    };
    let router = Arc::clone(&state.router);
    let response = tokio::task::block_in_place(|| {
        handle_request(&router, &context, &NoopRootsClient, request)
    });
    match response {
        Some(response) => (
            StatusCode::OK,
            axum::Json(serde_json::to_value(&response).unwrap_or_else(|_| {
                json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32603, "message": "serialization failed" },
                })
            })),
        ),
        None => (StatusCode::ACCEPTED, axum::Json(json!({}))),
    }
}

// ============================================================================
// SECTION: Request Handling
// ============================================================================

/// Dispatches one JSON-RPC request; notifications return no response.
fn handle_request(
    router: &ToolRouter,
    context: &RequestContext,
    roots: &dyn RootsClient,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    if request.jsonrpc != "2.0" {
        return Some(error_response(
            request.id.unwrap_or(Value::Null),
            -32600,
            "invalid json-rpc version",
        ));
    }
    let id = request.id?;
    let response = match request.method.as_str() {
        "initialize" => ok_response(id, initialize_result()),
        "ping" => ok_response(id, json!({})),
        "tools/list" => ok_response(id, json!({ "tools": tool_definitions() })),
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => {
                    match router.handle_tool_call(context, roots, &call.name, call.arguments) {
                        Ok(result) => match serde_json::to_value(&result) {
                            Ok(value) => ok_response(id, value),
                            Err(_) => error_response(id, -32603, "serialization failed"),
                        },
                        Err(err) => tool_error_response(id, &err),
                    }
                }
                Err(_) => error_response(id, -32602, "invalid tool call params"),
            }
        }
        "resources/list" => ok_response(id, json!({ "resources": router.list_resources() })),
        "resources/read" => {
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<ResourceReadParams>(params) {
                Ok(read) => match router.read_resource(context, &read.uri) {
                    Ok(value) => ok_response(id, value),
                    Err(err) => tool_error_response(id, &err),
                },
                Err(_) => error_response(id, -32602, "invalid resource params"),
            }
        }
        _ => error_response(id, -32601, "method not found"),
    };
    Some(response)
}

/// Builds the `initialize` result payload.
fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {},
        },
        "serverInfo": {
            "name": "precedent",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "instructions": INSTRUCTIONS,
    })
}

/// Builds a success response.
fn ok_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

/// Builds an error response.
fn error_response(id: Value, code: i64, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
        }),
    }
}

/// Maps tool errors onto JSON-RPC responses. Service failures surface as
/// tool results flagged `isError` so agents can read the message; protocol
/// failures use JSON-RPC error envelopes.
fn tool_error_response(id: Value, error: &ToolError) -> JsonRpcResponse {
    match error {
        ToolError::UnknownTool => error_response(id, -32601, "unknown tool"),
        ToolError::InvalidParams(message) => error_response(id, -32602, message),
        ToolError::Serialization => error_response(id, -32603, "serialization failed"),
        ToolError::Unauthenticated(message) => error_response(id, -32001, message),
        ToolError::UnknownResource(message) => error_response(id, -32002, message),
        ToolError::Service(err) => {
            let result = ToolCallResult {
                content: vec![ToolContent::Text {
                    text: err.to_string(),
                }],
                is_error: true,
            };
            match serde_json::to_value(&result) {
                Ok(value) => ok_response(id, value),
                Err(_) => error_response(id, -32603, "serialization failed"),
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::INSTRUCTIONS;
    use super::initialize_result;

    #[test]
    fn handshake_advertises_tools_resources_and_instructions() {
        let result = initialize_result();
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
        assert_eq!(result["serverInfo"]["name"], "precedent");
        let instructions = result["instructions"].as_str().unwrap_or_default();
        assert!(instructions.contains("check"));
        assert!(instructions.contains("trace"));
        assert_eq!(instructions, INSTRUCTIONS);
    }
}
