//! Relaybot Providers — the messaging capability.
//!
//! This crate contains:
//! - **traits**: `Messenger` trait, `ModelRequest`/`ModelTurn`, `ProviderError`
//! - **anthropic**: reqwest client for the Anthropic Messages API

pub mod anthropic;
pub mod traits;

pub use anthropic::{web_search_tool, AnthropicMessenger};
pub use traits::{Messenger, ModelRequest, ModelTurn, ProviderError};
