//! The model ↔ tool round-trip loop.
//!
//! One `handle_message` call appends the user's message, then alternates
//! model calls and tool executions until the model stops asking for tools
//! or the iteration cap is hit. Runs on the same thread id are serialized,
//! so concurrent callers cannot interleave a thread's history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use relaybot_core::conversation::ConversationStore;
use relaybot_core::types::{ContentBlock, Message, StopReason};
use relaybot_providers::{Messenger, ModelRequest, ProviderError};

use crate::tools::ToolRegistry;

/// Reply when the model is still asking for tools at the iteration cap.
const MAX_ITERATIONS_REPLY: &str = "reached maximum tool use iterations";

/// What the model sees when a tool invocation itself broke. Detail goes to
/// the log, never to the model.
const INTERNAL_TOOL_ERROR: &str = "internal error executing tool";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model call failed: {0}")]
    ModelCall(#[from] ProviderError),
}

/// Tunables for the loop.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub max_tool_iterations: u32,
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_tool_iterations: 10,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// The agent: messenger, tools, and conversation state wired together.
pub struct AgentLoop {
    messenger: Arc<dyn Messenger>,
    tools: Arc<ToolRegistry>,
    conversations: Arc<ConversationStore>,
    config: AgentConfig,
    thread_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AgentLoop {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        tools: Arc<ToolRegistry>,
        conversations: Arc<ConversationStore>,
        config: AgentConfig,
    ) -> Self {
        AgentLoop {
            messenger,
            tools,
            conversations,
            config,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Handle one user message on a thread and return the reply text.
    ///
    /// The user message is appended before the first model call and stays
    /// in history even when that call fails, so a retry carries it.
    pub async fn handle_message(
        &self,
        thread_id: &str,
        user_text: &str,
    ) -> Result<String, AgentError> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;

        self.conversations
            .append(thread_id, vec![Message::user(user_text)]);

        let max_iterations = self.config.max_tool_iterations.max(1);
        let tool_timeout = if self.config.tool_timeout.is_zero() {
            Duration::from_secs(30)
        } else {
            self.config.tool_timeout
        };
        let has_tools = !self.tools.is_empty();

        let system_prompt = format!(
            "{}{}",
            self.config.system_prompt,
            tool_capabilities_prompt(&self.tools)
        );

        for iteration in 0..max_iterations {
            let mut request = ModelRequest {
                messages: self.conversations.get(thread_id),
                system: (!system_prompt.is_empty()).then(|| system_prompt.clone()),
                tools: Vec::new(),
            };

            if has_tools {
                request.tools = self.tools.definitions();
                if iteration == 0 {
                    let names: Vec<&str> = request
                        .tools
                        .iter()
                        .map(|d| d.name().unwrap_or("(unknown)"))
                        .collect();
                    info!(count = names.len(), ?names, "Sending tools to model");
                }
            }

            let turn = self.messenger.send_message(request).await?;
            self.conversations
                .append(thread_id, vec![turn.message.clone()]);

            if turn.stop_reason != StopReason::ToolUse {
                return Ok(turn.message.extract_text());
            }
            // Guard against looping forever when only server tools exist.
            if !has_tools {
                return Ok(turn.message.extract_text());
            }

            let mut results: Vec<ContentBlock> = Vec::new();
            for (use_id, name, input) in turn.message.tool_uses() {
                if !self.tools.has_local_tool(name) {
                    continue;
                }

                let outcome =
                    tokio::time::timeout(tool_timeout, self.tools.execute(name, input.clone()))
                        .await;
                let block = match outcome {
                    Ok(Ok(output)) => {
                        ContentBlock::tool_result(use_id, output.content, output.is_error)
                    }
                    Ok(Err(e)) => {
                        warn!(tool = name, error = %e, "Tool execution error");
                        ContentBlock::tool_result(use_id, INTERNAL_TOOL_ERROR, true)
                    }
                    Err(_) => {
                        warn!(tool = name, timeout = ?tool_timeout, "Tool execution timed out");
                        ContentBlock::tool_result(use_id, INTERNAL_TOOL_ERROR, true)
                    }
                };
                results.push(block);
            }

            if results.is_empty() {
                return Ok(turn.message.extract_text());
            }
            self.conversations
                .append(thread_id, vec![Message::tool_results(results)]);
        }

        Ok(MAX_ITERATIONS_REPLY.to_string())
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.thread_locks.lock().unwrap();
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// System prompt section describing the available tools, built from the
/// registry so it stays in sync with what is actually registered.
pub fn tool_capabilities_prompt(tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut parts: Vec<String> = Vec::new();
    if tools.has_server_tools() {
        parts.push("- Web search: you can search the web for current information".to_string());
    }
    for name in tools.local_tool_names() {
        if name.starts_with("fs_") {
            parts.push(
                "- Filesystem: you can read, write, and list files in a sandboxed directory"
                    .to_string(),
            );
        } else {
            parts.push(format!("- {}", name));
        }
    }

    // Deduplicate (e.g. multiple fs_ tools produce one line)
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<String> = parts.into_iter().filter(|p| seen.insert(p.clone())).collect();
    if unique.is_empty() {
        return String::new();
    }

    format!(
        "\n\nYou have access to the following tools:\n{}",
        unique.join("\n")
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
