//! Wulang Gateway - WhatsApp study-assistant bot
//!
//! This library provides the core functionality for the Wulang
//! gateway:
//! - WhatsApp Cloud API intake (webhook) and reply delivery
//! - Message deduplication and command classification
//! - Conversation threads with a sliding history window
//! - Pending-media staging for attachment-then-caption flows
//! - AI reply generation over a chat-completions API
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              WhatsApp Cloud API              │
//! └──────────────────────┬───────────────────────┘
//!                        │ webhook
//! ┌──────────────────────▼───────────────────────┐
//! │                Wulang Gateway                │
//! │  Dedup │ Classify │ Orchestrate │ Maintain   │
//! └──────────────────────┬───────────────────────┘
//!                        │
//! ┌──────────────────────▼───────────────────────┐
//! │       Chat-completions API (responder)       │
//! └──────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod classify;
pub mod config;
pub mod context;
pub mod daemon;
pub mod db;
pub mod dedup;
pub mod error;
pub mod maintenance;
pub mod media;
pub mod orchestrator;
pub mod pending;
pub mod responder;
pub mod transport;

pub use classify::{Classifier, Command};
pub use config::Config;
pub use context::ContextAssembler;
pub use daemon::Daemon;
pub use db::DbPool;
pub use dedup::DedupFilter;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, ReplyDecision};
pub use pending::{PendingMedia, PendingMediaStore};
pub use responder::{OpenAiResponder, Responder};
pub use transport::{InboundMessage, MediaFetcher, ReplySink, WhatsAppClient};
