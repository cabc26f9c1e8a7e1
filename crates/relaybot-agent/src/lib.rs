//! Relaybot Agent — tool system, MCP bridge, and the agent loop.
//!
//! This crate contains:
//! - **tools**: Tool trait, sandboxed filesystem tools, and the registry
//! - **mcp**: bridge to external tool servers (stdio / SSE / streamable)
//! - **agent_loop**: the model ↔ tool round-trip loop

pub mod agent_loop;
pub mod mcp;
pub mod tools;

pub use agent_loop::{tool_capabilities_prompt, AgentConfig, AgentError, AgentLoop};
pub use mcp::McpBridge;
pub use tools::{filesystem_tools, Tool, ToolOutput, ToolRegistry};
