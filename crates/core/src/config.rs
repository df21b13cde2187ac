//! Layered runtime configuration.
//!
//! Values come from an optional TOML file followed by the process
//! environment, so `STEAM_API_KEY=... steam2notion` works without any file.
//! The resolved [`AppConfig`] is immutable and handed to constructors.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{error::ConfigError, http::RetryPolicy};

/// Directory under the user's config dir holding `config.toml`.
pub const DEFAULT_CONFIG_DIR: &str = "steam2notion";

const DEFAULT_STEAM_API_BASE: &str = "https://api.steampowered.com";
const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com";
const DEFAULT_MAX_RETRIES: usize = 20;
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# steam2notion configuration.
#
# Secrets are best supplied through the environment:
#   STEAM_API_KEY, STEAM_USER_ID, NOTION_DATABASE_API_KEY, NOTION_DATABASE_ID
# Any key below may also be overridden by an environment variable of the same name.

# Also record free games that have logged playtime.
include_played_free_games = false

# Update pages that already exist when the playtime changed.
enable_item_update = false

# Skip games that were barely played and have no achievements.
enable_filter = false

# Attempts per request and the fixed pause between them.
max_retries = 20
retry_delay_ms = 2000

# Per-request timeout.
request_timeout_secs = 30
"#;

#[derive(Debug, Deserialize)]
struct RawConfig {
    steam_api_key: Option<String>,
    steam_user_id: Option<String>,
    notion_database_api_key: Option<String>,
    notion_database_id: Option<String>,
    #[serde(default)]
    include_played_free_games: bool,
    #[serde(default)]
    enable_item_update: bool,
    #[serde(default)]
    enable_filter: bool,
    #[serde(default = "default_max_retries")]
    max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    retry_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    steam_api_base: Option<String>,
    notion_api_base: Option<String>,
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Resolved configuration for one run.
///
/// Secrets are redacted in `Debug` output.
#[derive(Clone)]
pub struct AppConfig {
    /// Steam Web API key.
    pub steam_api_key: String,
    /// 64-bit Steam id of the library owner.
    pub steam_user_id: String,
    /// Notion integration token.
    pub notion_token: String,
    /// Target database. Only required for syncing.
    pub notion_database_id: Option<String>,
    /// Ask Steam to include played free-to-play titles.
    pub include_played_free_games: bool,
    /// Update existing pages whose playtime changed.
    pub enable_item_update: bool,
    /// Apply the "not worth recording" filter.
    pub enable_filter: bool,
    /// Attempts per outbound request.
    pub max_retries: usize,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Steam Web API root.
    pub steam_api_base: String,
    /// Notion API root.
    pub notion_api_base: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("steam_api_key", &"<REDACTED>")
            .field("steam_user_id", &self.steam_user_id)
            .field("notion_token", &"<REDACTED>")
            .field("notion_database_id", &self.notion_database_id)
            .field("include_played_free_games", &self.include_played_free_games)
            .field("enable_item_update", &self.enable_item_update)
            .field("enable_filter", &self.enable_filter)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("request_timeout", &self.request_timeout)
            .field("steam_api_base", &self.steam_api_base)
            .field("notion_api_base", &self.notion_api_base)
            .finish()
    }
}

impl AppConfig {
    /// Load from the default config file (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path(), Environment::default())
    }

    /// Load from an explicit file path and environment source.
    ///
    /// The file is optional; environment values take precedence over it.
    pub fn load_from(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env.ignore_empty(true))
            .build()?;
        Self::from_settings(settings)
    }

    /// Validate already-built settings.
    pub fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let raw: RawConfig = settings.try_deserialize()?;

        if raw.max_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "max_retries",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            steam_api_key: required(raw.steam_api_key, "STEAM_API_KEY")?,
            steam_user_id: required(raw.steam_user_id, "STEAM_USER_ID")?,
            notion_token: required(raw.notion_database_api_key, "NOTION_DATABASE_API_KEY")?,
            notion_database_id: non_empty(raw.notion_database_id),
            include_played_free_games: raw.include_played_free_games,
            enable_item_update: raw.enable_item_update,
            enable_filter: raw.enable_filter,
            max_retries: raw.max_retries,
            retry_delay: Duration::from_millis(raw.retry_delay_ms),
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
            steam_api_base: non_empty(raw.steam_api_base)
                .unwrap_or_else(|| DEFAULT_STEAM_API_BASE.to_string()),
            notion_api_base: non_empty(raw.notion_api_base)
                .unwrap_or_else(|| DEFAULT_NOTION_API_BASE.to_string()),
        })
    }

    /// Database id, or an error when syncing was requested without one.
    pub fn database_id(&self) -> Result<&str, ConfigError> {
        self.notion_database_id
            .as_deref()
            .ok_or(ConfigError::Missing("NOTION_DATABASE_ID"))
    }

    /// Retry behaviour for the HTTP client.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: self.retry_delay,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing(key))
}

/// Default location of `config.toml`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_CONFIG_DIR)
        .join("config.toml")
}

/// Write the commented template to the default location when no file exists.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

/// Write the commented template to `path` unless a file is already there.
///
/// Returns `true` when a file was written.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("failed to write config {}", path.display()))?;
    Ok(true)
}
