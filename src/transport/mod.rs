//! Transport seam
//!
//! The gateway consumes normalized [`InboundMessage`]s and replies
//! through the [`ReplySink`] trait; attachment references are resolved
//! to bytes through [`MediaFetcher`]. The WhatsApp Cloud API
//! implementation lives in [`whatsapp`].

pub mod whatsapp;

use async_trait::async_trait;

use crate::media::MediaPayload;
use crate::Result;

pub use whatsapp::{WhatsAppClient, WhatsAppWebhook};

/// An attachment reference on an inbound message; bytes are fetched
/// lazily via [`MediaFetcher`]
#[derive(Debug, Clone)]
pub struct InboundAttachment {
    /// Transport media id, resolvable to bytes
    pub media_id: String,

    /// Declared content type
    pub mime_type: String,

    /// Original filename, if supplied
    pub filename: Option<String>,
}

/// A normalized message from the transport
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Transport message identifier
    pub id: String,

    /// Canonical sender id (bare phone number)
    pub sender_id: String,

    /// Message text (caption for media messages); may be empty
    pub text: String,

    /// Attachment carried by the message, if any
    pub attachment: Option<InboundAttachment>,

    /// Whether the message originated from the bot's own account
    pub is_from_self: bool,

    /// Whether the message came from a group context
    pub is_group: bool,
}

/// Sends replies back to a sender
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Deliver a text reply to the sender
    ///
    /// # Errors
    ///
    /// Returns error if delivery fails
    async fn send_reply(&self, sender_id: &str, text: &str) -> Result<()>;
}

/// Resolves a transport media id to raw bytes
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the attachment payload
    ///
    /// # Errors
    ///
    /// Returns error if the download fails
    async fn fetch(&self, media_id: &str) -> Result<MediaPayload>;
}

/// Canonicalize a transport-native address to a bare phone-number
/// string: strips the server suffix (`@s.whatsapp.net`, `@g.us`, ...)
/// and surrounding whitespace.
#[must_use]
pub fn canonicalize_sender(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .split_once('@')
        .map_or(trimmed, |(number, _)| number)
        .to_string()
}

/// Whether a raw transport address names a group chat
#[must_use]
pub fn is_group_address(raw: &str) -> bool {
    raw.trim().ends_with("@g.us")
}
