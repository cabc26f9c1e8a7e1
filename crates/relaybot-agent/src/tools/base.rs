//! Tool trait — the abstract interface every locally-executed tool implements.

use async_trait::async_trait;
use serde_json::Value;

use relaybot_core::types::{CustomTool, InputSchema};

// ─────────────────────────────────────────────
// Tool output
// ─────────────────────────────────────────────

/// What a tool hands back to the model.
///
/// `is_error` marks a domain failure (bad path, missing file, malformed
/// input) that the model should see and can react to. Invocation failure
/// (the tool itself broke) is an `Err` from `execute` instead.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        ToolOutput {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        ToolOutput {
            content: content.into(),
            is_error: true,
        }
    }
}

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// Every locally-executed tool implements this trait.
///
/// The agent loop discovers tools via `name()`, sends their schemas to the
/// model via `to_definition()`, and dispatches calls via `execute()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used by the model to call this tool (e.g. `"fs_read"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema describing the input object.
    fn input_schema(&self) -> InputSchema;

    /// Execute the tool with the given input value.
    ///
    /// Domain failures come back as `ToolOutput::error(...)`; an `Err`
    /// means the invocation itself broke and the model only gets a
    /// generic message.
    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput>;

    /// Build the definition sent to the model. Rarely needs overriding.
    fn to_definition(&self) -> CustomTool {
        CustomTool::new(self.name(), self.description(), self.input_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct DummyTool;

    #[async_trait]
    impl Tool for DummyTool {
        fn name(&self) -> &str {
            "dummy"
        }
        fn description(&self) -> &str {
            "A test tool"
        }
        fn input_schema(&self) -> InputSchema {
            InputSchema::object(json!({"msg": {"type": "string"}}), &["msg"])
        }
        async fn execute(&self, _input: Value) -> anyhow::Result<ToolOutput> {
            Ok(ToolOutput::ok("ok"))
        }
    }

    #[test]
    fn test_to_definition_default() {
        let def = DummyTool.to_definition();
        assert_eq!(def.name, "dummy");
        assert_eq!(def.description, "A test tool");
        assert_eq!(def.input_schema.required, vec!["msg"]);
    }

    #[tokio::test]
    async fn test_output_constructors() {
        let out = DummyTool.execute(json!({"msg": "hi"})).await.unwrap();
        assert_eq!(out, ToolOutput::ok("ok"));
        assert!(ToolOutput::error("boom").is_error);
    }
}
