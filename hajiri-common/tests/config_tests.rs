//! Configuration resolution and graceful degradation
//!
//! Tests that touch HAJIRI_* environment variables are marked #[serial] so
//! they never race each other.

use hajiri_common::config::{
    load_toml_config, write_toml_config, CaptureConfig, ClientSettings, ConfigOverrides,
    LoggingConfig, TomlConfig, ENV_BASE_URL, ENV_CONFIG, ENV_TOKEN,
};
use serial_test::serial;
use std::env;
use std::time::Duration;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ENV_BASE_URL);
    env::remove_var(ENV_TOKEN);
    env::remove_var(ENV_CONFIG);
}

#[test]
fn test_toml_roundtrip_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let config = TomlConfig {
        base_url: Some("http://hajiri.college.edu".to_string()),
        access_token: None,
        request_timeout_secs: Some(10),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        capture: CaptureConfig {
            frame_count: 3,
            frame_interval_ms: 250,
        },
    };

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "base_url = [not toml").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(err.to_string().contains("Parse TOML failed"));
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let settings = ClientSettings::resolve(ConfigOverrides {
        config_path: Some(temp_dir.path().join("absent.toml")),
        ..Default::default()
    });

    assert_eq!(settings.base_url, "http://localhost:8000");
    assert_eq!(settings.request_timeout, Duration::from_secs(30));
    assert_eq!(settings.capture.frame_count, 5);
    assert!(settings.access_token.is_none());
}

#[test]
#[serial]
fn test_env_overrides_toml_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        "base_url = \"http://from-toml:8000\"\naccess_token = \"toml-token\"\n",
    )
    .unwrap();

    env::set_var(ENV_CONFIG, &path);
    env::set_var(ENV_BASE_URL, "http://from-env:8000");

    let settings = ClientSettings::resolve(ConfigOverrides::default());
    assert_eq!(settings.base_url, "http://from-env:8000");
    assert_eq!(settings.access_token.as_deref(), Some("toml-token"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(ENV_TOKEN, "env-token");

    let temp_dir = TempDir::new().unwrap();
    let settings = ClientSettings::resolve(ConfigOverrides {
        config_path: Some(temp_dir.path().join("absent.toml")),
        base_url: None,
        access_token: Some("cli-token".to_string()),
    });
    assert_eq!(settings.access_token.as_deref(), Some("cli-token"));

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_does_not_hide_toml_values() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        "base_url = \"http://from-toml:8000\"\naccess_token = \"toml-token\"\n",
    )
    .unwrap();

    env::set_var(ENV_BASE_URL, "");
    env::set_var(ENV_TOKEN, "  ");

    let settings = ClientSettings::resolve(ConfigOverrides {
        config_path: Some(path),
        ..Default::default()
    });
    assert_eq!(settings.base_url, "http://from-toml:8000");
    assert_eq!(settings.access_token.as_deref(), Some("toml-token"));

    clear_env();
}
