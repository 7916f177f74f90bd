//! AI responder seam
//!
//! The orchestrator talks to the language model through the
//! [`Responder`] trait; [`OpenAiResponder`] is the concrete
//! implementation over an OpenAI-compatible chat-completions API.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::db::{Message, MessageRole};
use crate::media::MediaPayload;
use crate::{Error, Result};

/// Confirmation sent after a successful history reset
pub const RESET_CONFIRMATION: &str =
    "Siap! Riwayat percakapan kamu sudah dihapus. Mulai dari awal ya.";

/// One turn of conversation history handed to the responder
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// API role: "user", "assistant", or "system"
    pub role: &'static str,
    pub text: String,
}

impl ChatTurn {
    /// Render a stored message as a history turn. Media-bearing turns
    /// become a placeholder plus the caption, since raw payloads are
    /// not replayed into history.
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Bot => "assistant",
            MessageRole::System => "system",
        };

        let text = match (&message.content, &message.media_id) {
            (Some(content), Some(_)) => format!("[sent an attachment] {content}"),
            (Some(content), None) => content.clone(),
            (None, _) => "[sent an attachment]".to_string(),
        };

        Self { role, text }
    }

    /// Convert a history window into responder turns
    #[must_use]
    pub fn from_history(messages: &[Message]) -> Vec<Self> {
        messages.iter().map(Self::from_message).collect()
    }
}

/// Generates replies from conversation history
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generate a reply to a text turn given the history window
    ///
    /// # Errors
    ///
    /// Returns error if the responder call fails
    async fn generate(&self, history: &[ChatTurn], prompt: &str) -> Result<String>;

    /// Generate a reply to a turn carrying a media payload
    ///
    /// # Errors
    ///
    /// Returns error if the responder call fails
    async fn generate_with_media(
        &self,
        history: &[ChatTurn],
        prompt: &str,
        media: &MediaPayload,
    ) -> Result<String>;

    /// Confirmation text for a completed reset
    fn reset_confirmation(&self) -> String {
        RESET_CONFIRMATION.to_string()
    }
}

/// Responder over an OpenAI-compatible chat-completions endpoint
pub struct OpenAiResponder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl OpenAiResponder {
    /// Create a responder from LLM configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured or the HTTP client
    /// cannot be built
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("no LLM API key configured".to_string()))?;

        // A stuck completion call must fail the turn, not stall the
        // single-consumer intake loop behind it
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn base_messages(&self, history: &[ChatTurn]) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ApiMessage {
            role: "system".to_string(),
            content: MessageContent::Text(self.system_prompt.clone()),
        });
        for turn in history {
            messages.push(ApiMessage {
                role: turn.role.to_string(),
                content: MessageContent::Text(turn.text.clone()),
            });
        }
        messages
    }

    async fn complete(&self, messages: Vec<ApiMessage>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(self.max_tokens),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::AiService(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AiService(format!("API error: {status} - {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::AiService(format!("failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::AiService("empty completion".to_string()))
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn generate(&self, history: &[ChatTurn], prompt: &str) -> Result<String> {
        let mut messages = self.base_messages(history);
        messages.push(ApiMessage {
            role: "user".to_string(),
            content: MessageContent::Text(prompt.to_string()),
        });
        self.complete(messages).await
    }

    async fn generate_with_media(
        &self,
        history: &[ChatTurn],
        prompt: &str,
        media: &MediaPayload,
    ) -> Result<String> {
        let mut messages = self.base_messages(history);

        // Only image payloads can ride along as vision content; other
        // kinds are described textually
        if media.mime_type.starts_with("image/") {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&media.data);
            let data_url = format!("data:{};base64,{encoded}", media.mime_type);
            messages.push(ApiMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ]),
            });
        } else {
            messages.push(ApiMessage {
                role: "user".to_string(),
                content: MessageContent::Text(format!(
                    "{prompt}\n\n[the user attached a {} file]",
                    media.mime_type
                )),
            });
        }

        self.complete(messages).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(role: MessageRole, content: Option<&str>, media: Option<&str>) -> Message {
        Message {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            role,
            content: content.map(ToString::to_string),
            media_id: media.map(ToString::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn chat_turn_maps_roles() {
        let user = ChatTurn::from_message(&message(MessageRole::User, Some("hi"), None));
        assert_eq!(user.role, "user");
        assert_eq!(user.text, "hi");

        let bot = ChatTurn::from_message(&message(MessageRole::Bot, Some("hello"), None));
        assert_eq!(bot.role, "assistant");
    }

    #[test]
    fn chat_turn_renders_media_placeholder() {
        let bare = ChatTurn::from_message(&message(MessageRole::User, None, Some("media-1")));
        assert_eq!(bare.text, "[sent an attachment]");

        let captioned =
            ChatTurn::from_message(&message(MessageRole::User, Some("what is this?"), Some("media-1")));
        assert_eq!(captioned.text, "[sent an attachment] what is this?");
    }

    #[test]
    fn responder_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            OpenAiResponder::new(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn api_base_trailing_slash_is_stripped() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_base: "https://api.example.com/v1/".to_string(),
            ..LlmConfig::default()
        };
        let responder = OpenAiResponder::new(&config).unwrap();
        assert_eq!(responder.api_base, "https://api.example.com/v1");
    }

    #[tokio::test]
    async fn generate_is_bounded_by_request_timeout() {
        // Server that accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_base: format!("http://{addr}/v1"),
            request_timeout: std::time::Duration::from_millis(250),
            ..LlmConfig::default()
        };
        let responder = OpenAiResponder::new(&config).unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            responder.generate(&[], "halo"),
        )
        .await
        .expect("call must be bounded by the client timeout");

        assert!(matches!(result.unwrap_err(), Error::AiService(_)));
        server.abort();
    }

    #[test]
    fn vision_request_serializes_as_parts() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: "what is in it?".to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,AAAA".to_string(),
                        },
                    },
                ]),
            }],
            max_tokens: Some(64),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"text\":\"what is in it?\""));
        assert!(json.contains("\"image_url\""));
    }
}
