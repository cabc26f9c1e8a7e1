//! Messenger trait — the model-call abstraction the agent loop depends on.
//!
//! The production implementation is `AnthropicMessenger` in `anthropic.rs`;
//! tests substitute scripted mocks.

use async_trait::async_trait;
use thiserror::Error;

use relaybot_core::types::{Message, StopReason, ToolDefinition};

/// Errors from a model call.
///
/// Model-call failure is the one error the agent loop propagates to its
/// caller; everything tool-side is reported back to the model instead.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// One request to the model: full history plus prompt and tool definitions.
#[derive(Clone, Debug, Default)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub tools: Vec<ToolDefinition>,
}

/// One model response: the assistant message and why generation stopped.
#[derive(Clone, Debug)]
pub struct ModelTurn {
    pub message: Message,
    pub stop_reason: StopReason,
}

/// Trait all model backends implement.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send the conversation to the model and return its next turn.
    async fn send_message(&self, request: ModelRequest) -> Result<ModelTurn, ProviderError>;
}
