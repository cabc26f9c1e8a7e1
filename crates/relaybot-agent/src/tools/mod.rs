//! Tool system — trait, sandbox, built-in filesystem tools, and registry.

pub mod base;
pub mod filesystem;
pub mod registry;
pub mod sandbox;

pub use base::{Tool, ToolOutput};
pub use filesystem::filesystem_tools;
pub use registry::{RegistryError, ToolRegistry};
pub use sandbox::{resolve_sandboxed, SandboxError};
