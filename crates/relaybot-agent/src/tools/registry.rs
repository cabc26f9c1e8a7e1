//! Tool registry — the capability surface the agent loop dispatches through.
//!
//! Holds locally-executed tools (filesystem, bridged MCP tools) alongside
//! opaque server-side declarations. Interior locking makes the registry
//! shareable across concurrent agent runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use relaybot_core::types::ToolDefinition;

use super::base::{Tool, ToolOutput};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

#[derive(Default)]
struct Inner {
    local: HashMap<String, Arc<dyn Tool>>,
    server: Vec<ToolDefinition>,
}

/// Registry of all tools available to the agent.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a locally-executed tool. Re-registering a name replaces it.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!(tool = %name, "Registered tool");
        self.inner.write().unwrap().local.insert(name, tool);
    }

    /// Add an opaque server-side tool declaration.
    pub fn add_server_tool(&self, definition: ToolDefinition) {
        self.inner.write().unwrap().server.push(definition);
    }

    /// All definitions sent to the model: local tools sorted by name,
    /// then server declarations in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let inner = self.inner.read().unwrap();
        let mut locals: Vec<&Arc<dyn Tool>> = inner.local.values().collect();
        locals.sort_by_key(|t| t.name().to_string());

        let mut defs: Vec<ToolDefinition> = locals
            .iter()
            .map(|t| ToolDefinition::Custom(t.to_definition()))
            .collect();
        defs.extend(inner.server.iter().cloned());
        defs
    }

    /// Execute a local tool by name.
    ///
    /// The lock is released before the tool runs, so slow tools don't
    /// block registry reads.
    pub async fn execute(&self, name: &str, input: Value) -> anyhow::Result<ToolOutput> {
        let tool = {
            let inner = self.inner.read().unwrap();
            inner
                .local
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?
        };
        tool.execute(input).await
    }

    pub fn has_local_tool(&self, name: &str) -> bool {
        self.inner.read().unwrap().local.contains_key(name)
    }

    /// Names of all local tools, sorted.
    pub fn local_tool_names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let mut names: Vec<String> = inner.local.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_server_tools(&self) -> bool {
        !self.inner.read().unwrap().server.is_empty()
    }

    /// True when neither local tools nor server declarations exist.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read().unwrap();
        inner.local.is_empty() && inner.server.is_empty()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner.local.len() + inner.server.len()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
