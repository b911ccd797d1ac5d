//! Configuration loading and management.
//!
//! Configuration is loaded with the following precedence:
//! 1. Environment variables (`RAGCHAT_*`)
//! 2. Config file (`~/.ragchat/config.toml`)
//! 3. Defaults

use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Default backend address.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default title for newly created chats.
pub const DEFAULT_CHAT_TITLE: &str = "New chat";

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Backend API configuration.
    pub api: ApiConfig,

    /// Local storage configuration.
    pub storage: StorageConfig,

    /// Chat behaviour configuration.
    pub chat: ChatConfig,
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend, without a trailing path.
    pub base_url: String,

    /// Optional per-request timeout in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: None,
        }
    }
}

/// Local storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the session token.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_ragchat_home(),
        }
    }
}

/// Chat behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Title sent when creating a chat.
    pub default_title: String,

    /// Initial state of the retrieval-mode toggle.
    pub use_tables: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_CHAT_TITLE.to_string(),
            use_tables: false,
        }
    }
}

/// Get the default ragchat home directory.
///
/// Uses `RAGCHAT_HOME` if set, otherwise `~/.ragchat`.
#[must_use]
pub fn default_ragchat_home() -> PathBuf {
    if let Ok(home) = env::var("RAGCHAT_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir().map_or_else(|| PathBuf::from(".ragchat"), |h| h.join(".ragchat"))
}

/// Load configuration with precedence: env vars → file → defaults.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if an
/// environment override has an invalid value.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    let config_path = get_config_path();
    if config_path.exists() {
        let contents = fs::read_to_string(&config_path).map_err(Error::Storage)?;
        config = toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
    }

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Get the path to the config file.
fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var("RAGCHAT_CONFIG") {
        return PathBuf::from(path);
    }
    default_ragchat_home().join("config.toml")
}

/// Apply environment variable overrides to config.
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(path) = env::var("RAGCHAT_STORAGE_PATH") {
        config.storage.path = PathBuf::from(path);
    } else if let Ok(home) = env::var("RAGCHAT_HOME") {
        config.storage.path = PathBuf::from(home);
    }

    if let Ok(url) = env::var("RAGCHAT_API_URL") {
        let url = url.trim();
        if !url.is_empty() {
            config.api.base_url = url.to_string();
        }
    }

    if let Ok(val) = env::var("RAGCHAT_TIMEOUT_SECS") {
        let secs: u64 = val.trim().parse().map_err(|_| {
            Error::Config(format!("RAGCHAT_TIMEOUT_SECS must be an integer, got {val:?}"))
        })?;
        config.api.timeout_secs = (secs > 0).then_some(secs);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout_secs, None);
        assert_eq!(config.chat.default_title, "New chat");
        assert!(!config.chat.use_tables);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
            [api]
            base_url = "https://rag.example.com"
            timeout_secs = 90

            [storage]
            path = "/tmp/ragchat-test"

            [chat]
            default_title = "Новый чат"
            use_tables = true
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "https://rag.example.com");
        assert_eq!(config.api.timeout_secs, Some(90));
        assert_eq!(config.storage.path, PathBuf::from("/tmp/ragchat-test"));
        assert_eq!(config.chat.default_title, "Новый чат");
        assert!(config.chat.use_tables);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml = r"
            [chat]
            use_tables = true
        ";

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.chat.use_tables);
        assert_eq!(config.chat.default_title, "New chat"); // Default
        assert_eq!(config.api.base_url, DEFAULT_API_URL); // Default
    }
}
