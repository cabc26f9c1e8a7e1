//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentSettings`, `ProviderSettings`, `ToolsSettings`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! `#[serde(rename_all = "camelCase")]` handles the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.relaybot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentSettings,
    pub provider: ProviderSettings,
    pub tools: ToolsSettings,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Agent loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Model identifier sent to the API.
    pub model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// System prompt prepended to every request.
    pub system_prompt: String,
    /// Maximum model/tool round trips per user message.
    pub max_tool_iterations: u32,
    /// Per-tool execution timeout in seconds.
    pub tool_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            system_prompt: "You are a helpful assistant.".to_string(),
            max_tool_iterations: 10,
            tool_timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// Model API credentials and endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// API key for authentication.
    pub api_key: String,
    /// Custom API base URL (overrides the default endpoint).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderSettings {
    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Tool configuration: sandbox, server-side tools, external servers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsSettings {
    /// Root directory for the filesystem tools. Empty disables them.
    pub sandbox_dir: String,
    /// Register the server-side web-search tool.
    pub web_search_enabled: bool,
    /// External MCP tool servers to bridge at startup.
    pub mcp_servers: Vec<McpServerConfig>,
}

/// One external tool server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpServerConfig {
    /// Unique name, used to prefix bridged tool names.
    pub name: String,
    /// Transport kind: "stdio", "sse", or "streamable".
    pub transport: String,
    /// Command to spawn (stdio transport).
    pub command: String,
    /// Arguments for the spawned command.
    pub args: Vec<String>,
    /// Extra environment for the spawned command.
    pub env: HashMap<String, String>,
    /// Server URL (sse / streamable transports).
    pub url: String,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            transport: "stdio".to_string(),
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            url: String::new(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.model, "claude-sonnet-4-20250514");
        assert_eq!(config.agent.max_tokens, 4096);
        assert_eq!(config.agent.max_tool_iterations, 10);
        assert!(!config.provider.is_configured());
        assert!(config.tools.mcp_servers.is_empty());
        assert!(!config.tools.web_search_enabled);
    }

    #[test]
    fn test_camel_case_keys() {
        let json = r#"{
            "agent": {"maxTokens": 2048, "systemPrompt": "Be terse."},
            "provider": {"apiKey": "sk-test", "apiBase": "http://localhost:8080"},
            "tools": {
                "sandboxDir": "/tmp/sandbox",
                "webSearchEnabled": true,
                "mcpServers": [
                    {"name": "files", "transport": "stdio", "command": "mcp-files"}
                ]
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.agent.max_tokens, 2048);
        assert_eq!(config.agent.system_prompt, "Be terse.");
        // Unspecified fields fall back to defaults
        assert_eq!(config.agent.max_tool_iterations, 10);
        assert_eq!(config.provider.api_key, "sk-test");
        assert_eq!(config.provider.api_base.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.tools.sandbox_dir, "/tmp/sandbox");
        assert!(config.tools.web_search_enabled);
        assert_eq!(config.tools.mcp_servers.len(), 1);
        assert_eq!(config.tools.mcp_servers[0].name, "files");
        assert_eq!(config.tools.mcp_servers[0].transport, "stdio");
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert!(json["agent"].get("maxTokens").is_some());
        assert!(json["tools"].get("sandboxDir").is_some());
    }
}
