//! WhatsApp Cloud API transport
//!
//! Receives messages via the Webhooks API (parsed here, served by
//! `crate::api`) and sends replies and media lookups through the
//! Graph API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{
    canonicalize_sender, is_group_address, InboundAttachment, InboundMessage, MediaFetcher,
    ReplySink,
};
use crate::config::WhatsAppConfig;
use crate::media::MediaPayload;
use crate::{Error, Result};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// WhatsApp Cloud API client
pub struct WhatsAppClient {
    client: Client,
    access_token: String,
    phone_number_id: String,
    api_base: String,
}

impl WhatsAppClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing or the HTTP client
    /// cannot be built
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            return Err(Error::Config("WhatsApp access token required".to_string()));
        }
        if config.phone_number_id.is_empty() {
            return Err(Error::Config(
                "WhatsApp phone number ID required".to_string(),
            ));
        }

        // Replies and media downloads sit on the intake path; an
        // unresponsive Graph API must fail the turn, not hang it
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            api_base: GRAPH_API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.to_string();
        self
    }

    /// Send a text message to a WhatsApp number
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text }
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("WhatsApp API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "WhatsApp API error: {status} - {body}"
            )));
        }

        tracing::debug!(to, "WhatsApp message sent");
        Ok(())
    }
}

#[async_trait]
impl ReplySink for WhatsAppClient {
    async fn send_reply(&self, sender_id: &str, text: &str) -> Result<()> {
        self.send_text(sender_id, text).await
    }
}

#[async_trait]
impl MediaFetcher for WhatsAppClient {
    // Two-step Cloud API lookup: resolve the media id to a short-lived
    // URL, then download the bytes with the same bearer token
    async fn fetch(&self, media_id: &str) -> Result<MediaPayload> {
        let meta: MediaMetadata = self
            .client
            .get(format!("{}/{media_id}", self.api_base))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("media lookup failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Transport(format!("media lookup failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Transport(format!("media lookup failed: {e}")))?;

        let response = self
            .client
            .get(&meta.url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("media download failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Transport(format!("media download failed: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("media download failed: {e}")))?;

        Ok(MediaPayload::new(
            bytes.to_vec(),
            meta.mime_type.as_deref().unwrap_or("application/octet-stream"),
        ))
    }
}

/// Media metadata returned by the Graph API media endpoint
#[derive(Debug, Deserialize)]
struct MediaMetadata {
    url: String,
    mime_type: Option<String>,
}

/// WhatsApp webhook payload from the Cloud API
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhook {
    /// Webhook entries
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// Webhook entry
#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    /// Changes in this entry
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// Webhook change
#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    /// The change value
    pub value: WebhookValue,
}

/// Webhook value containing messages and sending-number metadata
#[derive(Debug, Deserialize)]
pub struct WebhookValue {
    /// Incoming messages (if any)
    pub messages: Option<Vec<WebhookMessage>>,

    /// Metadata about the receiving business number
    pub metadata: Option<WebhookMetadata>,
}

/// Receiving business number metadata
#[derive(Debug, Deserialize)]
pub struct WebhookMetadata {
    /// Display phone number of the bot's own account
    pub display_phone_number: Option<String>,
}

/// One message in a webhook delivery
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    /// Sender address
    pub from: String,

    /// Message ID
    pub id: String,

    /// Text content (for text messages)
    pub text: Option<TextContent>,

    /// Image content
    pub image: Option<MediaContent>,

    /// Document content
    pub document: Option<MediaContent>,
}

/// Text message body
#[derive(Debug, Deserialize)]
pub struct TextContent {
    pub body: String,
}

/// Media object (image or document)
#[derive(Debug, Deserialize)]
pub struct MediaContent {
    /// Media id, resolvable via the Graph API
    pub id: String,

    /// MIME type
    pub mime_type: Option<String>,

    /// Caption
    pub caption: Option<String>,

    /// Filename (documents only)
    pub filename: Option<String>,
}

impl WhatsAppWebhook {
    /// Flatten a webhook delivery into normalized inbound messages.
    /// Events with neither text nor a supported attachment are
    /// dropped.
    #[must_use]
    pub fn into_inbound(self) -> Vec<InboundMessage> {
        let mut inbound = Vec::new();

        for entry in self.entry {
            for change in entry.changes {
                let own_number = change
                    .value
                    .metadata
                    .as_ref()
                    .and_then(|m| m.display_phone_number.clone())
                    .map(|n| canonicalize_sender(&n));

                let Some(messages) = change.value.messages else {
                    continue;
                };

                for msg in messages {
                    let sender_id = canonicalize_sender(&msg.from);
                    let is_group = is_group_address(&msg.from);
                    let is_from_self = own_number.as_deref() == Some(sender_id.as_str());

                    let mut text = msg.text.map(|t| t.body).unwrap_or_default();

                    let attachment = msg
                        .image
                        .map(|m| (m, "image/jpeg"))
                        .or_else(|| msg.document.map(|m| (m, "application/octet-stream")))
                        .map(|(media, default_mime)| {
                            if text.is_empty() {
                                if let Some(caption) = &media.caption {
                                    text = caption.clone();
                                }
                            }
                            InboundAttachment {
                                media_id: media.id,
                                mime_type: media
                                    .mime_type
                                    .unwrap_or_else(|| default_mime.to_string()),
                                filename: media.filename,
                            }
                        });

                    if text.is_empty() && attachment.is_none() {
                        continue;
                    }

                    inbound.push(InboundMessage {
                        id: msg.id,
                        sender_id,
                        text,
                        attachment,
                        is_from_self,
                        is_group,
                    });
                }
            }
        }

        inbound
    }
}
