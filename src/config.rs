use std::fmt;
use std::path::PathBuf;

use crate::models::presence::{Presence, PresenceStatus};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=9&encoding=json";
pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v9";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} is required"),
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {key}: '{value}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load variables from a `.env` file in the working directory or one of its
/// parents. Variables already present in the environment are kept. Returns
/// the file that was read, if any.
pub fn load_env_file() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            // Logging is not initialised yet.
            eprintln!("ignoring unreadable .env file: {e}");
            None
        }
    }
}

/// Immutable process configuration. Built once at startup and passed into
/// the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub presence: Presence,
    pub display_name: Option<String>,
    pub gateway_url: String,
    pub api_base_url: String,
    pub port: u16,
    pub keep_alive: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("TOKEN"))?;

        let status = match std::env::var("PRESENCE_STATUS") {
            Ok(v) => v.parse::<PresenceStatus>().map_err(|_| ConfigError::Invalid {
                key: "PRESENCE_STATUS",
                value: v,
            })?,
            Err(_) => PresenceStatus::Online,
        };

        let custom_text = std::env::var("CUSTOM_STATUS").unwrap_or_else(|_| "Asleep".to_string());

        // Set-but-empty disables the profile update.
        let display_name = match std::env::var("DISPLAY_NAME") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some("Celestial".to_string()),
        };

        Ok(Self {
            token,
            presence: Presence {
                status,
                custom_text,
            },
            display_name,
            gateway_url: std::env::var("GATEWAY_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string()),
            api_base_url: std::env::var("API_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            keep_alive: std::env::var("KEEP_ALIVE")
                .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
                .unwrap_or(true),
        })
    }
}
