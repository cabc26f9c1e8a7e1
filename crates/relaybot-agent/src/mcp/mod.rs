//! Bridge to external MCP tool servers.
//!
//! `McpBridge::connect` dials each configured server, discovers its tools,
//! and registers them as local tools named `{server}_{tool}`. A failing
//! server never takes the others down: its error is collected and the
//! aggregate is reported after every server has been tried.

pub mod session;
pub mod transport;

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use relaybot_core::config::McpServerConfig;
use relaybot_core::types::InputSchema;

use crate::tools::{Tool, ToolOutput, ToolRegistry};
use session::{CallToolResult, McpSession, McpToolInfo};
use transport::create_transport;

// ─────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────

/// Owns the live sessions to all connected tool servers.
#[derive(Default)]
pub struct McpBridge {
    sessions: Vec<Arc<McpSession>>,
}

impl McpBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to every configured server and register its tools.
    ///
    /// Per-server failures are collected; servers that connected stay
    /// connected and registered. Returns `Err` carrying the aggregate when
    /// anything failed.
    pub async fn connect(
        &mut self,
        servers: &[McpServerConfig],
        registry: &ToolRegistry,
    ) -> anyhow::Result<()> {
        let mut errs: Vec<String> = Vec::new();

        for cfg in servers {
            let transport = match create_transport(cfg).await {
                Ok(t) => t,
                Err(e) => {
                    errs.push(format!("{}: {}", cfg.name, e));
                    continue;
                }
            };

            let session = match McpSession::connect(&cfg.name, transport).await {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    errs.push(format!("{}: connection failed: {}", cfg.name, e));
                    continue;
                }
            };
            self.sessions.push(session.clone());

            let tools = match session.list_tools().await {
                Ok(t) => t,
                Err(e) => {
                    errs.push(format!("{}: tool listing failed: {}", cfg.name, e));
                    continue;
                }
            };

            let count = tools.len();
            for tool in tools {
                registry.register(Arc::new(McpTool::new(&cfg.name, tool, session.clone())));
            }
            info!(server = %cfg.name, tools = count, "MCP server connected");
        }

        if !errs.is_empty() {
            bail!("MCP connection errors: {}", errs.join("; "));
        }
        Ok(())
    }

    /// Shut down every session, best-effort.
    pub async fn close_all(&self) {
        for session in &self.sessions {
            if let Err(e) = session.close().await {
                warn!(server = session.name(), error = %e, "Error closing MCP session");
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

// ─────────────────────────────────────────────
// Bridged tool
// ─────────────────────────────────────────────

/// One server tool exposed under the composite `{server}_{tool}` name.
pub struct McpTool {
    name: String,
    tool_name: String,
    description: String,
    input_schema: InputSchema,
    session: Arc<McpSession>,
}

impl McpTool {
    fn new(server_name: &str, info: McpToolInfo, session: Arc<McpSession>) -> Self {
        McpTool {
            name: bridged_name(server_name, &info.name),
            tool_name: info.name,
            description: info.description,
            input_schema: schema_to_input_schema(info.input_schema.as_ref()),
            session,
        }
    }
}

/// Composite name a bridged tool is registered under.
fn bridged_name(server: &str, tool: &str) -> String {
    format!("{}_{}", server, tool)
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> InputSchema {
        self.input_schema.clone()
    }

    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput> {
        let arguments = match input {
            Value::Object(map) => Value::Object(map),
            Value::Null => Value::Object(serde_json::Map::new()),
            other => {
                return Ok(ToolOutput::error(format!(
                    "invalid tool input: expected object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let result = self
            .session
            .call_tool(&self.tool_name, arguments)
            .await
            .map_err(|e| anyhow::anyhow!("MCP tool call failed: {}", e))?;

        Ok(ToolOutput {
            content: result_to_text(&result),
            is_error: result.is_error,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────
// Wire conversions
// ─────────────────────────────────────────────

/// Translate a server's advertised schema into the model's schema shape.
/// Anything malformed degrades to an empty valid object schema.
fn schema_to_input_schema(schema: Option<&Value>) -> InputSchema {
    let Some(Value::Object(map)) = schema else {
        return InputSchema::empty();
    };

    let properties = map.get("properties").cloned().unwrap_or(Value::Null);
    let required: Vec<String> = map
        .get("required")
        .and_then(|r| r.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let mut out = InputSchema::object(properties, &[]);
    out.required = required;
    out
}

/// Flatten a call result into the text the model reads: text parts
/// verbatim, anything else serialized as JSON, joined with newlines.
fn result_to_text(result: &CallToolResult) -> String {
    let mut parts: Vec<String> = Vec::new();
    for content in &result.content {
        if content["type"] == "text" {
            if let Some(text) = content["text"].as_str() {
                parts.push(text.to_string());
                continue;
            }
        }
        if let Ok(serialized) = serde_json::to_string(content) {
            parts.push(serialized);
        }
    }
    parts.join("\n")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
