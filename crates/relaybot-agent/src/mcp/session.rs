//! One initialized session with an external tool server.

use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::transport::McpTransport;

const PROTOCOL_VERSION: &str = "2025-03-26";

/// A tool advertised by a server.
#[derive(Clone, Debug, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[derive(Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<McpToolInfo>,
}

/// Result of one tool call.
#[derive(Clone, Debug, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// An established connection: the initialize handshake has completed and
/// requests can flow.
pub struct McpSession {
    name: String,
    transport: Box<dyn McpTransport>,
}

impl McpSession {
    /// Run the initialize handshake over a fresh transport.
    pub async fn connect(name: &str, transport: Box<dyn McpTransport>) -> anyhow::Result<Self> {
        let init = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "relaybot", "version": "1.0.0"}
                })),
            )
            .await
            .context("initialize failed")?;
        debug!(
            server = name,
            version = init["protocolVersion"].as_str().unwrap_or("?"),
            "initialize handshake complete"
        );

        transport
            .notify("notifications/initialized", None)
            .await
            .context("initialized notification failed")?;

        Ok(McpSession {
            name: name.to_string(),
            transport,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discover the server's tools.
    pub async fn list_tools(&self) -> anyhow::Result<Vec<McpToolInfo>> {
        let result = self.transport.request("tools/list", None).await?;
        let parsed: ListToolsResult =
            serde_json::from_value(result).context("malformed tools/list result")?;
        Ok(parsed.tools)
    }

    /// Invoke one tool with the given argument object.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<CallToolResult> {
        let result = self
            .transport
            .request(
                "tools/call",
                Some(json!({"name": name, "arguments": arguments})),
            )
            .await?;
        serde_json::from_value(result).context("malformed tools/call result")
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_info_deserialization() {
        let info: McpToolInfo = serde_json::from_value(json!({
            "name": "search",
            "description": "Search things",
            "inputSchema": {"type": "object", "properties": {"q": {"type": "string"}}}
        }))
        .unwrap();
        assert_eq!(info.name, "search");
        assert!(info.input_schema.is_some());

        // description and schema are optional
        let bare: McpToolInfo = serde_json::from_value(json!({"name": "noop"})).unwrap();
        assert_eq!(bare.description, "");
        assert!(bare.input_schema.is_none());
    }

    #[test]
    fn test_call_result_defaults() {
        let result: CallToolResult =
            serde_json::from_value(json!({"content": [{"type": "text", "text": "hi"}]})).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);

        let flagged: CallToolResult =
            serde_json::from_value(json!({"content": [], "isError": true})).unwrap();
        assert!(flagged.is_error);
    }
}
