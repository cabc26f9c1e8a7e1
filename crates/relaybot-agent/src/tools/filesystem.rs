//! Filesystem tools — read, write, and list within a sandbox directory.
//!
//! All failures here are domain failures reported to the model as
//! error-flagged results; the tools themselves never return `Err`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use relaybot_core::types::InputSchema;

use super::base::{Tool, ToolOutput};
use super::sandbox::resolve_sandboxed;

/// Largest file `fs_read` will return.
const MAX_FILE_READ_SIZE: u64 = 1 << 20;

/// Most entries `fs_list` will print before truncating.
const MAX_LIST_ENTRIES: usize = 200;

/// The three filesystem tools, rooted at `sandbox_dir`.
pub fn filesystem_tools(sandbox_dir: PathBuf) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(FsReadTool {
            sandbox_dir: sandbox_dir.clone(),
        }),
        Arc::new(FsWriteTool {
            sandbox_dir: sandbox_dir.clone(),
        }),
        Arc::new(FsListTool { sandbox_dir }),
    ]
}

fn invalid_input(e: serde_json::Error) -> ToolOutput {
    ToolOutput::error(format!("invalid input: {}", e))
}

// ─────────────────────────────────────────────
// fs_read
// ─────────────────────────────────────────────

pub struct FsReadTool {
    sandbox_dir: PathBuf,
}

#[derive(Deserialize)]
struct FsReadInput {
    path: String,
}

#[async_trait]
impl Tool for FsReadTool {
    fn name(&self) -> &str {
        "fs_read"
    }

    fn description(&self) -> &str {
        "Read a file from the sandbox directory. Returns file contents as text. Max 1MB."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::object(
            json!({
                "path": {
                    "type": "string",
                    "description": "Relative path within the sandbox directory"
                }
            }),
            &["path"],
        )
    }

    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput> {
        let params: FsReadInput = match serde_json::from_value(input) {
            Ok(p) => p,
            Err(e) => return Ok(invalid_input(e)),
        };

        let resolved = match resolve_sandboxed(&self.sandbox_dir, &params.path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutput::error(e.to_string())),
        };

        let meta = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(_) => return Ok(ToolOutput::error(format!("file not found: {}", params.path))),
        };
        if meta.is_dir() {
            return Ok(ToolOutput::error("path is a directory, use fs_list instead"));
        }
        if meta.len() > MAX_FILE_READ_SIZE {
            return Ok(ToolOutput::error(format!(
                "file too large: {} bytes (max {})",
                meta.len(),
                MAX_FILE_READ_SIZE
            )));
        }

        match tokio::fs::read(&resolved).await {
            Ok(data) => Ok(ToolOutput::ok(String::from_utf8_lossy(&data).into_owned())),
            Err(e) => Ok(ToolOutput::error(format!("failed to read file: {}", e))),
        }
    }
}

// ─────────────────────────────────────────────
// fs_write
// ─────────────────────────────────────────────

pub struct FsWriteTool {
    sandbox_dir: PathBuf,
}

#[derive(Deserialize)]
struct FsWriteInput {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for FsWriteTool {
    fn name(&self) -> &str {
        "fs_write"
    }

    fn description(&self) -> &str {
        "Write content to a file in the sandbox directory. Creates parent directories as needed."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::object(
            json!({
                "path": {
                    "type": "string",
                    "description": "Relative path within the sandbox directory"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            }),
            &["path", "content"],
        )
    }

    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput> {
        let params: FsWriteInput = match serde_json::from_value(input) {
            Ok(p) => p,
            Err(e) => return Ok(invalid_input(e)),
        };

        let resolved = match resolve_sandboxed(&self.sandbox_dir, &params.path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutput::error(e.to_string())),
        };

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolOutput::error(format!(
                    "failed to create directories: {}",
                    e
                )));
            }
        }

        match tokio::fs::write(&resolved, params.content.as_bytes()).await {
            Ok(()) => Ok(ToolOutput::ok(format!(
                "wrote {} bytes to {}",
                params.content.len(),
                params.path
            ))),
            Err(e) => Ok(ToolOutput::error(format!("failed to write file: {}", e))),
        }
    }
}

// ─────────────────────────────────────────────
// fs_list
// ─────────────────────────────────────────────

pub struct FsListTool {
    sandbox_dir: PathBuf,
}

#[derive(Deserialize)]
struct FsListInput {
    #[serde(default)]
    path: String,
}

#[async_trait]
impl Tool for FsListTool {
    fn name(&self) -> &str {
        "fs_list"
    }

    fn description(&self) -> &str {
        "List files and directories in a path within the sandbox directory. Max 200 entries."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::object(
            json!({
                "path": {
                    "type": "string",
                    "description": "Relative path within the sandbox directory (empty or \".\" for root)"
                }
            }),
            &[],
        )
    }

    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput> {
        let mut params: FsListInput = match serde_json::from_value(input) {
            Ok(p) => p,
            Err(e) => return Ok(invalid_input(e)),
        };
        if params.path.is_empty() {
            params.path = ".".to_string();
        }

        let resolved = match resolve_sandboxed(&self.sandbox_dir, &params.path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutput::error(e.to_string())),
        };

        let mut read_dir = match tokio::fs::read_dir(&resolved).await {
            Ok(rd) => rd,
            Err(e) => {
                return Ok(ToolOutput::error(format!(
                    "failed to list directory: {}",
                    e
                )))
            }
        };

        // Collect and name-sort for stable output
        let mut entries: Vec<(String, bool)> = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        for (i, (name, is_dir)) in entries.iter().enumerate() {
            if i >= MAX_LIST_ENTRIES {
                out.push_str(&format!(
                    "... and {} more entries\n",
                    entries.len() - MAX_LIST_ENTRIES
                ));
                break;
            }
            out.push_str(name);
            if *is_dir {
                out.push('/');
            }
            out.push('\n');
        }

        if out.is_empty() {
            return Ok(ToolOutput::ok("(empty directory)"));
        }
        Ok(ToolOutput::ok(out))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
