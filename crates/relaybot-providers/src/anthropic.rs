//! Anthropic Messages API client.
//!
//! Talks to `POST {base}/v1/messages` with the content-block wire format:
//! the full history goes up, an assistant message (text and/or tool-use
//! blocks) plus a stop reason comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use relaybot_core::types::{ContentBlock, Message, Role, StopReason, ToolDefinition};

use crate::traits::{Messenger, ModelRequest, ModelTurn, ProviderError};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─────────────────────────────────────────────
// AnthropicMessenger
// ─────────────────────────────────────────────

/// Messenger backed by the Anthropic Messages API.
pub struct AnthropicMessenger {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for AnthropicMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicMessenger")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicMessenger {
    pub fn new(api_key: &str, api_base: Option<&str>, model: &str, max_tokens: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        AnthropicMessenger {
            client,
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        }
    }

    fn messages_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/v1/messages", base)
    }
}

/// Request body for `/v1/messages`.
#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDefinition],
}

/// Response body from `/v1/messages`.
#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<StopReason>,
}

#[async_trait]
impl Messenger for AnthropicMessenger {
    async fn send_message(&self, request: ModelRequest) -> Result<ModelTurn, ProviderError> {
        let system = request.system.as_deref().filter(|s| !s.is_empty());
        let body = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: &request.messages,
            system,
            tools: &request.tools,
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling model API"
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            error!(status = %status, body = %body, "Model API error");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let stop_reason = parsed.stop_reason.unwrap_or(StopReason::Other);
        debug!(?stop_reason, blocks = parsed.content.len(), "Model response received");

        Ok(ModelTurn {
            message: Message {
                role: Role::Assistant,
                content: parsed.content,
            },
            stop_reason,
        })
    }
}

// ─────────────────────────────────────────────
// Server-side tools
// ─────────────────────────────────────────────

/// Declaration for the API-executed web-search tool.
///
/// The API runs this tool itself; it only needs to be declared in requests.
pub fn web_search_tool() -> ToolDefinition {
    ToolDefinition::Server(serde_json::json!({
        "type": "web_search_20250305",
        "name": "web_search",
        "max_uses": 5
    }))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relaybot_core::types::{CustomTool, InputSchema};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_messenger(base: &str) -> AnthropicMessenger {
        AnthropicMessenger::new("test-key-123", Some(base), "claude-sonnet-4-20250514", 1024)
    }

    // ── Unit tests ──

    #[test]
    fn test_messages_url_trailing_slash() {
        let messenger = make_messenger("http://localhost:9000/");
        assert_eq!(messenger.messages_url(), "http://localhost:9000/v1/messages");
    }

    #[test]
    fn test_default_api_base() {
        let messenger =
            AnthropicMessenger::new("key", None, "claude-sonnet-4-20250514", 1024);
        assert_eq!(
            messenger.messages_url(),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn test_web_search_tool_declaration() {
        let tool = web_search_tool();
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "web_search_20250305");
        assert_eq!(json["name"], "web_search");
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_send_message_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key-123"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 1024,
                "system": "Be helpful."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_test",
                "content": [{"type": "text", "text": "Hello there!"}],
                "stop_reason": "end_turn"
            })))
            .mount(&mock_server)
            .await;

        let messenger = make_messenger(&mock_server.uri());
        let turn = messenger
            .send_message(ModelRequest {
                messages: vec![Message::user("Hello")],
                system: Some("Be helpful.".to_string()),
                tools: vec![],
            })
            .await
            .unwrap();

        assert_eq!(turn.stop_reason, StopReason::EndTurn);
        assert_eq!(turn.message.role, Role::Assistant);
        assert_eq!(turn.message.extract_text(), "Hello there!");
    }

    #[tokio::test]
    async fn test_send_message_with_tool_use() {
        let mock_server = MockServer::start().await;

        // The request must carry the tool definitions
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({
                "tools": [{"name": "fs_read"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_tool",
                "content": [
                    {"type": "text", "text": "Reading the file."},
                    {"type": "tool_use", "id": "toolu_1", "name": "fs_read",
                     "input": {"path": "notes.txt"}}
                ],
                "stop_reason": "tool_use"
            })))
            .mount(&mock_server)
            .await;

        let messenger = make_messenger(&mock_server.uri());
        let turn = messenger
            .send_message(ModelRequest {
                messages: vec![Message::user("Read notes.txt")],
                system: None,
                tools: vec![ToolDefinition::Custom(CustomTool::new(
                    "fs_read",
                    "Read a file",
                    InputSchema::empty(),
                ))],
            })
            .await
            .unwrap();

        assert_eq!(turn.stop_reason, StopReason::ToolUse);
        let uses: Vec<_> = turn.message.tool_uses().collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "fs_read");
        assert_eq!(uses[0].2["path"], "notes.txt");
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error": {"message": "max_tokens required"}}"#),
            )
            .mount(&mock_server)
            .await;

        let messenger = make_messenger(&mock_server.uri());
        let err = messenger
            .send_message(ModelRequest {
                messages: vec![Message::user("hi")],
                system: None,
                tools: vec![],
            })
            .await
            .unwrap_err();

        match err {
            ProviderError::Api { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("max_tokens required"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_error_is_transport() {
        // Nothing listens on this port
        let messenger = make_messenger("http://127.0.0.1:9");
        let err = messenger
            .send_message(ModelRequest {
                messages: vec![Message::user("hi")],
                system: None,
                tools: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[test]
    fn test_request_body_omits_empty_fields() {
        let body = ApiRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 64,
            messages: &[],
            system: None,
            tools: &[],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("tools").is_none());
        assert_eq!(json["max_tokens"], 64);
    }
}
