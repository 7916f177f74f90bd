//! TOML configuration file loading
//!
//! Supports `~/.config/wulang/config.toml` as a persistent config
//! source. All fields are optional — the file is a partial overlay on
//! top of defaults, and environment variables override both.

use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct WulangConfigFile {
    /// Data directory override
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Conversation behavior tunables
    #[serde(default)]
    pub bot: BotFileConfig,

    /// WhatsApp Cloud API credentials
    #[serde(default)]
    pub whatsapp: WhatsAppFileConfig,

    /// AI responder configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Conversation behavior tunables
#[derive(Debug, Default, Deserialize)]
pub struct BotFileConfig {
    /// Activation substring (default "wulang")
    pub trigger_keyword: Option<String>,

    /// Reset command keyword (default "!reset")
    pub reset_keyword: Option<String>,

    /// History sliding-window size (default 10)
    pub context_window: Option<usize>,

    /// Thread retention in days (default 90)
    pub retention_days: Option<i64>,

    /// Staged attachment TTL in minutes (default 30)
    pub pending_media_ttl_mins: Option<u64>,

    /// Maintenance interval in hours (default 24)
    pub maintenance_interval_hours: Option<u64>,
}

/// WhatsApp credentials
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppFileConfig {
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub verify_token: Option<String>,

    /// Graph API request timeout in seconds (default 30)
    pub request_timeout_secs: Option<u64>,
}

/// AI responder configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub api_key: Option<String>,

    /// Chat-completions base URL (default OpenAI)
    pub api_base: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// Max tokens per completion
    pub max_tokens: Option<u32>,

    /// System prompt for the assistant
    pub system_prompt: Option<String>,

    /// Completion request timeout in seconds (default 60)
    pub request_timeout_secs: Option<u64>,
}

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
}

impl WulangConfigFile {
    /// Load the config file if present; absent file yields defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)?;
        let parsed = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(parsed)
    }

    /// Default config file location
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("wulang").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let file: WulangConfigFile = toml::from_str(
            r#"
            [bot]
            trigger_keyword = "wulang"
            context_window = 6

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(file.bot.trigger_keyword.as_deref(), Some("wulang"));
        assert_eq!(file.bot.context_window, Some(6));
        assert_eq!(file.server.port, Some(9000));
        assert!(file.whatsapp.access_token.is_none());
        assert!(file.llm.model.is_none());
    }

    #[test]
    fn empty_file_is_valid() {
        let file: WulangConfigFile = toml::from_str("").unwrap();
        assert!(file.data_dir.is_none());
        assert!(file.bot.reset_keyword.is_none());
    }
}
