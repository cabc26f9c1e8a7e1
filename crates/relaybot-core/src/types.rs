//! Core wire types — the content-block message model spoken by the model API.
//!
//! A message is a role plus an ordered list of content blocks (text,
//! tool-use requests, tool results). Tool definitions come in two shapes:
//! locally-executed tools with a JSON schema, and opaque server-side
//! declarations the API executes itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// Who authored a message.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A conversation message: a role and an ordered list of content blocks.
///
/// Messages are immutable once appended to a conversation — the agent loop
/// only ever appends new ones.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message with a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with a single text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create a user message carrying tool results back to the model.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Message {
            role: Role::User,
            content: results,
        }
    }

    /// Concatenate all text blocks, newline-joined, in response order.
    /// Non-text blocks are skipped.
    pub fn extract_text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        parts.join("\n")
    }

    /// Iterate over the tool-use blocks in this message.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => {
                Some((id.as_str(), name.as_str(), input))
            }
            _ => None,
        })
    }
}

/// One segment of a message.
///
/// Unknown block kinds returned by the API (e.g. server-tool results) are
/// preserved verbatim in `Other` so history round-trips without loss.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(untagged)]
    Other(Value),
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Create a tool-use block.
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool-result block.
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

// ─────────────────────────────────────────────
// Stop reason
// ─────────────────────────────────────────────

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Other,
}

// ─────────────────────────────────────────────
// Tool definitions
// ─────────────────────────────────────────────

/// A tool definition included in model requests.
///
/// Locally-executed tools carry a name/description/schema; server-side tools
/// (e.g. web search) are opaque declarations forwarded to the API verbatim.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolDefinition {
    Custom(CustomTool),
    Server(Value),
}

impl ToolDefinition {
    /// The tool's name, if it can be determined.
    pub fn name(&self) -> Option<&str> {
        match self {
            ToolDefinition::Custom(t) => Some(&t.name),
            ToolDefinition::Server(v) => v.get("name").and_then(|n| n.as_str()),
        }
    }
}

/// Schema of a locally-executed tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CustomTool {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl CustomTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        CustomTool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// JSON input schema: a property map plus required-field list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl InputSchema {
    /// Build an object schema from a `{"prop": {...}}` properties value.
    ///
    /// A non-object `properties` value degrades to an empty property map.
    pub fn object(properties: Value, required: &[&str]) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        InputSchema {
            schema_type: "object".to_string(),
            properties,
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// An empty-but-valid object schema.
    pub fn empty() -> Self {
        Self::object(Value::Null, &[])
    }
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
