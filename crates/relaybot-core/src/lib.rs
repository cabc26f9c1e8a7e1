//! Relaybot Core — wire types, conversation store, and configuration.
//!
//! This crate contains:
//! - **types**: content-block message model and tool definitions
//! - **conversation**: concurrency-safe append-only conversation store
//! - **config**: schema + loader for `~/.relaybot/config.json`

pub mod config;
pub mod conversation;
pub mod types;

pub use config::{Config, McpServerConfig};
pub use conversation::{ConversationStore, ThreadSummary};
pub use types::{
    ContentBlock, CustomTool, InputSchema, Message, Role, StopReason, ToolDefinition,
};
