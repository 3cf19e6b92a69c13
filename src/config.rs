//! Configuration and settings management
//!
//! Loads settings from environment variables and optional config files,
//! and defines the Telegram and media constants used across the bot.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(alias = "token")]
    pub telegram_token: String,

    /// Public mention handle of the bot, e.g. `@my_bot`
    pub bot_username: String,

    /// Base URL of the hybrid-parsing scraper API
    #[serde(default = "default_scraper_api_url")]
    pub scraper_api_url: String,

    /// Timeout applied to every outbound HTTP request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Long-polling interval in seconds
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Link shown by the `/start` command
    pub support_url: Option<String>,
}

fn default_scraper_api_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_http_timeout_secs() -> u64 {
    30
}

const fn default_poll_timeout_secs() -> u64 {
    3
}

/// Build the layered configuration source used by [`Settings::new`].
///
/// # Errors
///
/// Returns a `ConfigError` if one of the sources cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // This file shouldn't be checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__BOT_USERNAME=@bot ./target/tikgrab` sets `bot_username`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case,
        // ignore_empty treats empty env vars as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tikgrab::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;

        if settings.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message("telegram_token is empty".to_string()));
        }
        if settings.mention_handle().len() < 2 {
            return Err(ConfigError::Message("bot_username is empty".to_string()));
        }

        Ok(settings)
    }

    /// Mention handle normalized to the `@name` form.
    #[must_use]
    pub fn mention_handle(&self) -> String {
        let name = self.bot_username.trim().trim_start_matches('@');
        format!("@{name}")
    }
}

/// Domain marker a message must contain to be treated as a video link.
pub const TIKTOK_DOMAIN_MARKER: &str = "tiktok.com";

/// Path of the hybrid-parsing endpoint on the scraper API.
pub const SCRAPER_HYBRID_PATH: &str = "/api";

/// Bot API limit for files uploaded by the bot (50 MB).
pub const TELEGRAM_UPLOAD_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Maximum caption length accepted by Telegram for media messages.
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// File name given to the uploaded video.
pub const VIDEO_FILE_NAME: &str = "video.mp4";
