//! Error types for the Wulang gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Wulang gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing required input (e.g. empty sender id)
    #[error("validation error: {0}")]
    Validation(String),

    /// Persistence collaborator failure
    #[error("database error: {0}")]
    Database(String),

    /// AI responder collaborator failure
    #[error("AI service error: {0}")]
    AiService(String),

    /// Media storage or ingestion failure
    #[error("media error: {0}")]
    Media(String),

    /// Transport (WhatsApp API) failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
