use crate::app::App;
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::schema::input_schema;
use crate::model::ToolDescriptor;
use crate::services::coordinator::ExecutionCoordinator;
use crate::services::logger::Logger;
use crate::stores::DescriptorStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "toolbench";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Default)]
struct AdapterState {
    running: bool,
    tools: Vec<ToolDescriptor>,
}

fn map_tool_error(tool: &str, error: &ToolError) -> McpError {
    let message = format!("{} failed: {}", tool, error.message);
    match error.kind {
        ToolErrorKind::InvalidParams => McpError::new(ErrorCode::InvalidParams, message),
        ToolErrorKind::Timeout => McpError::new(ErrorCode::RequestTimeout, message),
        ToolErrorKind::Denied | ToolErrorKind::Conflict | ToolErrorKind::NotFound => {
            McpError::new(ErrorCode::InvalidRequest, message)
        }
        _ => McpError::new(ErrorCode::InternalError, message),
    }
}

/// Exposes registered tools over stdio JSON-RPC. The set served is
/// snapshotted at [`start`](Self::start); descriptor edits take effect
/// on the next restart.
pub struct McpAdapter {
    logger: Logger,
    descriptors: Arc<DescriptorStore>,
    coordinator: Arc<ExecutionCoordinator>,
    state: Mutex<AdapterState>,
}

impl McpAdapter {
    pub fn new(
        logger: &Logger,
        descriptors: Arc<DescriptorStore>,
        coordinator: Arc<ExecutionCoordinator>,
    ) -> Self {
        Self {
            logger: logger.child("mcp"),
            descriptors,
            coordinator,
            state: Mutex::new(AdapterState::default()),
        }
    }

    /// Loads enabled tools and marks the adapter running. Starting an
    /// already running adapter is an error.
    pub async fn start(&self) -> Result<usize, ToolError> {
        let mut state = self.state.lock().await;
        if state.running {
            return Err(ToolError::conflict("Server is already running"));
        }
        let tools = self.descriptors.list_enabled()?;
        let count = tools.len();
        state.tools = tools;
        state.running = true;
        self.logger
            .info("Adapter started", Some(&json!({ "tools": count })));
        Ok(count)
    }

    /// Stopping is idempotent.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if state.running {
            state.running = false;
            state.tools.clear();
            self.logger.info("Adapter stopped", None);
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"list": true, "call": true}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    async fn handle_tools_list(&self) -> Value {
        let state = self.state.lock().await;
        let tools: Vec<Value> = state
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": input_schema(tool),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        let tool = {
            let state = self.state.lock().await;
            state.tools.iter().find(|t| t.name == name).cloned()
        };
        let Some(tool) = tool else {
            return Err(McpError::new(
                ErrorCode::InvalidParams,
                format!("Unknown tool: {name}"),
            ));
        };

        let params = args.as_object().cloned().unwrap_or_default();
        match self.coordinator.invoke(&tool.id, &params).await {
            Ok(result) => {
                let text = match &result {
                    Value::String(s) => s.clone(),
                    other => serde_json::to_string_pretty(other)
                        .map_err(|err| map_tool_error(name, &ToolError::internal(err.to_string())))?,
                };
                Ok(json!({
                    "content": [ { "type": "text", "text": text } ]
                }))
            }
            Err(err) => {
                self.logger.warn(
                    "Tool call failed",
                    Some(&json!({ "tool": name, "error": err.to_string() })),
                );
                Ok(json!({
                    "content": [ { "type": "text", "text": format!("Error: {}", err) } ],
                    "isError": true,
                }))
            }
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.handle_initialize()),
            "tools/list" => JsonRpcResponse::success(id, self.handle_tools_list().await),
            "tools/call" => {
                let params = request.params.as_object().cloned().unwrap_or_default();
                let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                if name.is_empty() {
                    JsonRpcResponse::failure(
                        id,
                        McpError::new(ErrorCode::InvalidParams, "Missing tool name"),
                    )
                } else {
                    let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                    match self.handle_tools_call(name, args).await {
                        Ok(result) => JsonRpcResponse::success(id, result),
                        Err(err) => JsonRpcResponse::failure(id, err),
                    }
                }
            }
            _ => JsonRpcResponse::failure(
                id,
                McpError::new(ErrorCode::MethodNotFound, "Method not found"),
            ),
        };
        Some(response)
    }

    /// Line-delimited JSON-RPC loop over the given transport. The
    /// adapter is marked stopped when the loop exits, whether the
    /// reader closed or the transport failed.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.start().await?;
        let result = self.serve_loop(reader, writer).await;
        self.stop().await;
        result
    }

    async fn serve_loop<R, W>(&self, reader: R, writer: W) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = BufWriter::new(writer);

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed: Value = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(_) => {
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        McpError::new(ErrorCode::ParseError, "Parse error"),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let request: JsonRpcRequest = match serde_json::from_value(parsed) {
                Ok(request) => request,
                Err(_) => {
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        McpError::new(ErrorCode::InvalidRequest, "Invalid request"),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            if let Some(response) = self.dispatch(request).await {
                write_response(&mut writer, &response).await?;
            }
        }

        Ok(())
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut BufWriter<W>,
    response: &JsonRpcResponse,
) -> Result<(), ToolError> {
    let payload = serde_json::to_string(response)
        .map_err(|err| ToolError::internal(err.to_string()))?;
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let app = App::initialize()?;
    let reader = BufReader::new(tokio::io::stdin());
    app.adapter.serve(reader, tokio::io::stdout()).await
}
