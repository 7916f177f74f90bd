//! Configuration management for the Wulang gateway

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};
use file::WulangConfigFile;

/// Wulang gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, stored media)
    pub data_dir: PathBuf,

    /// Conversation behavior tunables
    pub bot: BotConfig,

    /// WhatsApp Cloud API credentials
    pub whatsapp: WhatsAppConfig,

    /// AI responder configuration
    pub llm: LlmConfig,

    /// HTTP server configuration
    pub server: ServerConfig,
}

/// Conversation behavior tunables
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Activation substring that enables AI processing ("wulang")
    pub trigger_keyword: String,

    /// Reset command keyword ("!reset")
    pub reset_keyword: String,

    /// Sliding-window size for conversation history
    pub context_window: usize,

    /// Days of inactivity after which threads are purged
    pub retention_days: i64,

    /// Maximum age of a staged attachment before it is swept
    pub pending_media_ttl: Duration,

    /// Interval between scheduled maintenance runs
    pub maintenance_interval: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            trigger_keyword: "wulang".to_string(),
            reset_keyword: "!reset".to_string(),
            context_window: 10,
            retention_days: 90,
            pending_media_ttl: Duration::from_secs(30 * 60),
            maintenance_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// WhatsApp Cloud API credentials
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Business API access token
    pub access_token: String,

    /// Phone number ID registered for sending messages
    pub phone_number_id: String,

    /// Webhook verification token (GET challenge handshake)
    pub verify_token: String,

    /// Upper bound on any single Graph API request
    pub request_timeout: Duration,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// AI responder configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the chat-completions endpoint
    pub api_key: Option<String>,

    /// Chat-completions base URL
    pub api_base: String,

    /// Model identifier
    pub model: String,

    /// Max tokens per completion
    pub max_tokens: u32,

    /// System prompt prepended to every conversation
    pub system_prompt: String,

    /// Upper bound on any single completion request; a stuck call
    /// fails the turn instead of stalling the intake loop
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            system_prompt: "You are Wulang, a friendly study assistant on WhatsApp. \
                            Answer concisely in the language the user writes in."
                .to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 18990 }
    }
}

impl Config {
    /// Load configuration from defaults, the optional TOML file, and
    /// environment variable overrides (highest precedence)
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be parsed,
    /// or if no data directory can be determined
    pub fn load() -> Result<Self> {
        let file = WulangConfigFile::load()?;
        Self::from_parts(file)
    }

    fn from_parts(file: WulangConfigFile) -> Result<Self> {
        let data_dir = env_var("WULANG_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| file.data_dir.clone().map(PathBuf::from))
            .or_else(default_data_dir)
            .ok_or_else(|| Error::Config("could not determine data directory".to_string()))?;

        let defaults = BotConfig::default();
        let bot = BotConfig {
            trigger_keyword: file
                .bot
                .trigger_keyword
                .unwrap_or(defaults.trigger_keyword)
                .to_lowercase(),
            reset_keyword: file
                .bot
                .reset_keyword
                .unwrap_or(defaults.reset_keyword)
                .to_lowercase(),
            context_window: file.bot.context_window.unwrap_or(defaults.context_window),
            retention_days: file.bot.retention_days.unwrap_or(defaults.retention_days),
            pending_media_ttl: file
                .bot
                .pending_media_ttl_mins
                .map_or(defaults.pending_media_ttl, |m| {
                    Duration::from_secs(m * 60)
                }),
            maintenance_interval: file
                .bot
                .maintenance_interval_hours
                .map_or(defaults.maintenance_interval, |h| {
                    Duration::from_secs(h * 60 * 60)
                }),
        };

        let whatsapp = WhatsAppConfig {
            access_token: env_var("WHATSAPP_ACCESS_TOKEN")
                .or(file.whatsapp.access_token)
                .unwrap_or_default(),
            phone_number_id: env_var("WHATSAPP_PHONE_NUMBER_ID")
                .or(file.whatsapp.phone_number_id)
                .unwrap_or_default(),
            verify_token: env_var("WHATSAPP_VERIFY_TOKEN")
                .or(file.whatsapp.verify_token)
                .unwrap_or_default(),
            request_timeout: file
                .whatsapp
                .request_timeout_secs
                .map_or(WhatsAppConfig::default().request_timeout, Duration::from_secs),
        };

        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            api_key: env_var("OPENAI_API_KEY").or(file.llm.api_key),
            api_base: file.llm.api_base.unwrap_or(llm_defaults.api_base),
            model: file.llm.model.unwrap_or(llm_defaults.model),
            max_tokens: file.llm.max_tokens.unwrap_or(llm_defaults.max_tokens),
            system_prompt: file.llm.system_prompt.unwrap_or(llm_defaults.system_prompt),
            request_timeout: file
                .llm
                .request_timeout_secs
                .map_or(llm_defaults.request_timeout, Duration::from_secs),
        };

        let server = ServerConfig {
            port: env_var("WULANG_PORT")
                .and_then(|p| p.parse().ok())
                .or(file.server.port)
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        Ok(Self {
            data_dir,
            bot,
            whatsapp,
            llm,
            server,
        })
    }

    /// Path to the SQLite database file
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("wulang.db")
    }

    /// Directory where ingested media payloads are stored
    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn default_data_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".wulang"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_defaults() {
        let bot = BotConfig::default();
        assert_eq!(bot.trigger_keyword, "wulang");
        assert_eq!(bot.reset_keyword, "!reset");
        assert_eq!(bot.context_window, 10);
        assert_eq!(bot.retention_days, 90);
    }

    #[test]
    fn config_from_empty_file_uses_defaults() {
        let config = Config::from_parts(WulangConfigFile::default()).unwrap();
        assert_eq!(config.bot.context_window, 10);
        assert_eq!(config.llm.api_base, "https://api.openai.com/v1");
        assert_eq!(config.llm.request_timeout, Duration::from_secs(60));
        assert_eq!(config.whatsapp.request_timeout, Duration::from_secs(30));
        assert!(config.db_path().ends_with("wulang.db"));
        assert!(config.media_dir().ends_with("media"));
    }

    #[test]
    fn file_keywords_are_lowercased() {
        let file = WulangConfigFile {
            bot: file::BotFileConfig {
                trigger_keyword: Some("Wulang".to_string()),
                reset_keyword: Some("!Reset".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = Config::from_parts(file).unwrap();
        assert_eq!(config.bot.trigger_keyword, "wulang");
        assert_eq!(config.bot.reset_keyword, "!reset");
    }
}
