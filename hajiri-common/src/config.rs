//! Configuration loading for the Sajilo Hajiri client
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--base-url, --token, --config)
//! 2. Environment variables (HAJIRI_BASE_URL, HAJIRI_TOKEN, HAJIRI_CONFIG)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing or unreadable TOML file never aborts startup: a warning is
//! logged and the built-in defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable overriding the backend base URL
pub const ENV_BASE_URL: &str = "HAJIRI_BASE_URL";
/// Environment variable carrying a bearer access token
pub const ENV_TOKEN: &str = "HAJIRI_TOKEN";
/// Environment variable pointing at an alternate TOML file
pub const ENV_CONFIG: &str = "HAJIRI_CONFIG";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FRAME_COUNT: usize = 5;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 400;

/// Configuration file contents
///
/// Every field is optional so that a partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    /// Backend base URL, e.g. `http://localhost:8000`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer access token
    #[serde(default)]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Camera burst settings for the recognition cycle
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CaptureConfig {
    /// Frames requested per burst
    #[serde(default = "default_frame_count")]
    pub frame_count: usize,

    /// Delay after each captured frame, in milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_count: default_frame_count(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

fn default_frame_count() -> usize {
    DEFAULT_FRAME_COUNT
}

fn default_frame_interval_ms() -> u64 {
    DEFAULT_FRAME_INTERVAL_MS
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub access_token: Option<String>,
}

/// Fully resolved client settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
    pub log_level: String,
    pub capture: CaptureConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_level: default_log_level(),
            capture: CaptureConfig::default(),
        }
    }
}

impl ClientSettings {
    /// Resolve settings from CLI overrides, environment, TOML and defaults
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let toml_config = match config_path {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{} - using built-in defaults", e);
                    TomlConfig::default()
                }
            },
            None => {
                debug!("No configuration directory available - using built-in defaults");
                TomlConfig::default()
            }
        };

        Self::merge(overrides, env_overrides(), toml_config)
    }

    /// Combine the tiers; earlier sources win
    pub fn merge(cli: ConfigOverrides, env: ConfigOverrides, toml: TomlConfig) -> Self {
        let defaults = ClientSettings::default();

        // A blank tier is treated as unset so lower tiers still apply
        let base_url = nonblank(cli.base_url)
            .or(nonblank(env.base_url))
            .or(nonblank(toml.base_url))
            .unwrap_or(defaults.base_url);

        let access_token = nonblank(cli.access_token)
            .or(nonblank(env.access_token))
            .or(nonblank(toml.access_token));

        let request_timeout = toml
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            request_timeout,
            log_level: toml.logging.level,
            capture: toml.capture,
        }
    }
}

fn nonblank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        config_path: None,
        base_url: std::env::var(ENV_BASE_URL).ok(),
        access_token: std::env::var(ENV_TOKEN).ok(),
    }
}

/// Default configuration file location: `<config dir>/hajiri/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hajiri").join("config.toml"))
}

/// Read and parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Config file not readable: {}: {}", path.display(), e))
    })?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}: {}", path.display(), e)))
}

/// Write a TOML configuration file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.base_url, "http://localhost:8000");
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.capture.frame_count, 5);
        assert_eq!(settings.capture.frame_interval(), Duration::from_millis(400));
        assert!(settings.access_token.is_none());
    }

    #[test]
    fn test_merge_priority_cli_over_env_over_toml() {
        let toml = TomlConfig {
            base_url: Some("http://toml:8000".to_string()),
            access_token: Some("toml-token".to_string()),
            ..Default::default()
        };
        let env = ConfigOverrides {
            base_url: Some("http://env:8000".to_string()),
            ..Default::default()
        };
        let cli = ConfigOverrides {
            access_token: Some("cli-token".to_string()),
            ..Default::default()
        };

        let settings = ClientSettings::merge(cli, env, toml);
        assert_eq!(settings.base_url, "http://env:8000");
        assert_eq!(settings.access_token.as_deref(), Some("cli-token"));
    }

    #[test]
    fn test_merge_ignores_blank_values() {
        let cli = ConfigOverrides {
            base_url: Some("   ".to_string()),
            access_token: Some(String::new()),
            ..Default::default()
        };

        let settings = ClientSettings::merge(cli, ConfigOverrides::default(), TomlConfig::default());
        assert_eq!(settings.base_url, "http://localhost:8000");
        assert!(settings.access_token.is_none());
    }

    #[test]
    fn test_blank_env_falls_through_to_toml() {
        let env = ConfigOverrides {
            base_url: Some(String::new()),
            access_token: Some("  ".to_string()),
            ..Default::default()
        };
        let toml = TomlConfig {
            base_url: Some("http://from-toml:8000".to_string()),
            access_token: Some("toml-token".to_string()),
            ..Default::default()
        };

        let settings = ClientSettings::merge(ConfigOverrides::default(), env, toml);
        assert_eq!(settings.base_url, "http://from-toml:8000");
        assert_eq!(settings.access_token.as_deref(), Some("toml-token"));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let cli = ConfigOverrides {
            base_url: Some("http://example.edu/".to_string()),
            ..Default::default()
        };
        let settings = ClientSettings::merge(cli, ConfigOverrides::default(), TomlConfig::default());
        assert_eq!(settings.base_url, "http://example.edu");
    }

    #[test]
    fn test_partial_toml_keeps_capture_defaults() {
        let config: TomlConfig = toml::from_str("[capture]\nframe_count = 3\n").unwrap();
        assert_eq!(config.capture.frame_count, 3);
        assert_eq!(config.capture.frame_interval_ms, 400);
        assert_eq!(config.logging.level, "info");
    }
}
