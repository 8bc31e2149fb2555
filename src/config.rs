use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::ChatId;

use crate::server::HEALTH_PATHS;

/// Card-status endpoint of the Yerevan transport API.
pub const DEFAULT_BALANCE_API_URL: &str =
    "https://transport-api.yerevan.am/api/citizen/card-status/";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Polling,
    Webhook,
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Falls back to the TOKEN environment variable when empty.
    #[serde(default)]
    telegram_bot_token: String,
    #[serde(default)]
    mode: Mode,
    /// Public https URL Telegram should push updates to (webhook mode only).
    webhook_url: Option<String>,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    #[serde(default = "default_balance_api_url")]
    balance_api_url: String,
    #[serde(default = "default_balance_timeout_secs")]
    balance_timeout_secs: u64,
    /// Directory for log files. Defaults to current directory.
    data_dir: Option<String>,
    /// Operator chat that receives warnings and errors.
    log_chat_id: Option<i64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_balance_api_url() -> String {
    DEFAULT_BALANCE_API_URL.to_string()
}

fn default_balance_timeout_secs() -> u64 {
    10
}

pub struct Config {
    pub telegram_bot_token: String,
    pub mode: Mode,
    pub webhook_url: Option<reqwest::Url>,
    /// Address the health endpoints (and the webhook, if enabled) listen on.
    pub listen_addr: SocketAddr,
    pub balance_api_url: reqwest::Url,
    pub balance_timeout: Duration,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env_token(path, std::env::var("TOKEN").ok())
    }

    fn load_with_env_token<P: AsRef<Path>>(
        path: P,
        env_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let telegram_bot_token = if file.telegram_bot_token.is_empty() {
            env_token.unwrap_or_default()
        } else {
            file.telegram_bot_token
        };
        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token is required (or set TOKEN)".into(),
            ));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABC...)".into(),
            ));
        }

        let webhook_url = file
            .webhook_url
            .map(|raw| {
                reqwest::Url::parse(&raw).map_err(|e| {
                    ConfigError::Validation(format!("webhook_url '{raw}' is invalid: {e}"))
                })
            })
            .transpose()?;
        match (&file.mode, &webhook_url) {
            (Mode::Webhook, None) => {
                return Err(ConfigError::Validation(
                    "webhook_url is required in webhook mode".into(),
                ));
            }
            (Mode::Webhook, Some(url)) if url.scheme() != "https" => {
                return Err(ConfigError::Validation("webhook_url must use https".into()));
            }
            // The webhook route shares a router with the health endpoints.
            (Mode::Webhook, Some(url)) if HEALTH_PATHS.contains(&url.path()) => {
                return Err(ConfigError::Validation(format!(
                    "webhook_url path '{}' is reserved for health checks",
                    url.path()
                )));
            }
            _ => {}
        }

        let listen_addr = file.listen_addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Validation(format!("listen_addr '{}' is invalid: {e}", file.listen_addr))
        })?;

        let balance_api_url = reqwest::Url::parse(&file.balance_api_url).map_err(|e| {
            ConfigError::Validation(format!(
                "balance_api_url '{}' is invalid: {e}",
                file.balance_api_url
            ))
        })?;

        if file.balance_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "balance_timeout_secs must be greater than zero".into(),
            ));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token,
            mode: file.mode,
            webhook_url,
            listen_addr,
            balance_api_url,
            balance_timeout: Duration::from_secs(file.balance_timeout_secs),
            data_dir,
            log_chat_id: file.log_chat_id.map(ChatId),
        })
    }
}
