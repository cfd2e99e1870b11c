//! Startup configuration bundle, loaded once from a JSON secrets file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ConfigError;

/// Largest page the primary channel accepts for `getChatHistory`.
pub const MAX_HISTORY_PAGE: i32 = 100;

/// Credentials and tuning for [`crate::Fetcher`] and [`crate::relay::Relay`].
///
/// Every key except the credentials has a default, so a minimal secrets file
/// only lists `phone`, `api_id`, `api_hash`, `bot_token`, `user_id`, `db` and
/// `bridge`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub phone:      String,
    pub email:      String,
    pub password:   String,
    /// Display name used if the account has to be registered.
    pub first_name: String,
    pub last_name:  String,
    pub api_id:     i32,
    pub api_hash:   String,
    /// Bot API token of the relay bot.
    pub bot_token:  String,
    /// Chat id of the human operator answering prompts.
    pub user_id:    String,
    /// Directory of the primary channel's local session database.
    pub db:         String,
    /// argv of the process speaking the primary channel protocol.
    pub bridge:     Vec<String>,

    pub user_response_timeout_secs: u64,
    pub updates_timeout_secs:       u64,
    pub receive_timeout_ms:         u64,
    pub idle_wait_ms:               u64,
    pub history_page_size:          i32,
    /// Shutdown is requested as soon as this path exists.
    pub stop_marker:                PathBuf,
    pub bot_api_base:               String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            phone:      String::new(),
            email:      String::new(),
            password:   String::new(),
            first_name: "User".into(),
            last_name:  String::new(),
            api_id:     0,
            api_hash:   String::new(),
            bot_token:  String::new(),
            user_id:    String::new(),
            db:         String::new(),
            bridge:     Vec::new(),

            user_response_timeout_secs: 120,
            updates_timeout_secs:       1,
            receive_timeout_ms:         1000,
            idle_wait_ms:               10,
            history_page_size:          MAX_HISTORY_PAGE,
            stop_marker:                PathBuf::from("data/stop"),
            bot_api_base:               "https://api.telegram.org".into(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_id", &self.api_id)
            .field("user_id", &self.user_id)
            .field("db", &self.db)
            .field("bridge", &self.bridge)
            .field("user_response_timeout_secs", &self.user_response_timeout_secs)
            .field("updates_timeout_secs", &self.updates_timeout_secs)
            .field("history_page_size", &self.history_page_size)
            .field("stop_marker", &self.stop_marker)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Read and validate the secrets file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw    = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from JSON text without validating it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Invalid("bot_token is empty"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::Invalid("user_id is empty"));
        }
        if self.bridge.is_empty() {
            return Err(ConfigError::Invalid("bridge command is empty"));
        }
        if self.history_page_size <= 0 || self.history_page_size > MAX_HISTORY_PAGE {
            return Err(ConfigError::Invalid("history_page_size must be within 1..=100"));
        }
        Ok(())
    }

    pub fn user_response_timeout(&self) -> Duration {
        Duration::from_secs(self.user_response_timeout_secs)
    }

    pub fn updates_timeout(&self) -> Duration {
        Duration::from_secs(self.updates_timeout_secs)
    }

    /// Wait bound for blocking receives before authorization completes.
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Wait bound while a history page is in flight and nothing is queued.
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}
