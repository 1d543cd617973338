//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;
use std::time::Duration;

use humantime_serde::re::humantime;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file (config.json) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    load_config_with(None)
}

/// Like [`load_config`], reading an explicit file instead of the default path.
///
/// An explicit path that does not exist is an error; the default path is
/// optional.
pub fn load_config_with(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => load_config_from_path(path)?,
        None => {
            let config_path = super::paths::config_path();
            if config_path.exists() {
                load_config_from_path(&config_path)?
            } else {
                Config::default()
            }
        }
    };

    // Apply environment variable overrides (highest precedence)
    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().is_some_and(|ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads a `.env` file first if one exists.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    dotenvy::dotenv().ok();
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary variable source
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    // Gateway overrides
    if let Some(bind) = lookup("MATHAGENT_BIND") {
        config.gateway.bind = bind;
    }
    if let Some(port) = lookup("MATHAGENT_PORT") {
        config.gateway.port = port
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("MATHAGENT_PORT is not a port: {}", port)))?;
    }
    if let Some(flag) = lookup("MATHAGENT_REPORT_LIVE_COUNT") {
        config.gateway.report_live_agent_count = parse_flag(&flag);
    }

    // Storage overrides
    if let Some(backend) = lookup("MATHAGENT_STORAGE") {
        config.storage.backend = backend.parse().map_err(Error::Config)?;
    }
    if let Some(path) = lookup("MATHAGENT_STORAGE_PATH") {
        config.storage.path = Some(path.into());
    }

    // Session overrides
    if let Some(value) = lookup("MATHAGENT_IDLE_EVICTION") {
        config.session.idle_eviction = parse_optional_duration("MATHAGENT_IDLE_EVICTION", &value)?;
    }
    if let Some(value) = lookup("MATHAGENT_LEG_IDLE_TIMEOUT") {
        config.session.leg_idle_timeout =
            parse_optional_duration("MATHAGENT_LEG_IDLE_TIMEOUT", &value)?;
    }
    if let Some(name) = lookup("MATHAGENT_DEFAULT_NAME") {
        config.session.default_agent_name = name;
    }

    // Client overrides
    if let Some(url) = lookup("MATHAGENT_URL") {
        config.client.base_url = url;
    }
    if let Some(value) = lookup("MATHAGENT_KEEPALIVE") {
        config.client.keepalive_interval = parse_duration("MATHAGENT_KEEPALIVE", &value)?;
    }

    Ok(())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_duration(var: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| Error::Config(format!("{} is not a duration ({}): {}", var, value, e)))
}

/// `off`/`none`/`disabled` turn the setting off
fn parse_optional_duration(var: &str, value: &str) -> Result<Option<Duration>> {
    match value.trim().to_lowercase().as_str() {
        "off" | "none" | "disabled" | "" => Ok(None),
        _ => parse_duration(var, value).map(Some),
    }
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}
