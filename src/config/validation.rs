//! Configuration validation
//!
//! Validates configuration and reports issues.

use std::time::Duration;

use super::types::storage::StorageBackendKind;
use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_gateway_config(config, result);
    result = validate_session_config(config, result);
    result = validate_storage_config(config, result);
    result = validate_client_config(config, result);

    result
}

fn validate_gateway_config(
    config: &Config,
    mut result: ConfigValidationResult,
) -> ConfigValidationResult {
    if config.gateway.bind.trim().is_empty() {
        result = result.with_error(
            ValidationIssue::new("gateway.bind", "Bind address is empty")
                .with_suggestion("Use 127.0.0.1 for local access or 0.0.0.0 for all interfaces"),
        );
    }

    if config.gateway.port == 0 {
        result = result.with_warning(ValidationIssue::new(
            "gateway.port",
            "Port 0 binds a random free port",
        ));
    }

    result
}

fn validate_session_config(
    config: &Config,
    mut result: ConfigValidationResult,
) -> ConfigValidationResult {
    if config.session.idle_eviction == Some(Duration::ZERO) {
        result = result.with_error(
            ValidationIssue::new("session.idle_eviction", "Idle eviction must be positive")
                .with_suggestion("Set it to null (or MATHAGENT_IDLE_EVICTION=off) to disable"),
        );
    }

    if config.session.leg_idle_timeout == Some(Duration::ZERO) {
        result = result.with_error(
            ValidationIssue::new("session.leg_idle_timeout", "Leg idle timeout must be positive")
                .with_suggestion("Set it to null (or MATHAGENT_LEG_IDLE_TIMEOUT=off) to disable"),
        );
    }

    if let Some(timeout) = config.session.leg_idle_timeout {
        if timeout <= config.client.keepalive_interval {
            result = result.with_warning(
                ValidationIssue::new(
                    "session.leg_idle_timeout",
                    "Leg idle timeout is not longer than the client keep-alive interval",
                )
                .with_suggestion("Idle legs that only ping may be disconnected"),
            );
        }
    }

    if config.session.default_agent_name.trim().is_empty() {
        result = result.with_warning(ValidationIssue::new(
            "session.default_agent_name",
            "Agents created without a name will have an empty name",
        ));
    }

    result
}

fn validate_storage_config(
    config: &Config,
    mut result: ConfigValidationResult,
) -> ConfigValidationResult {
    match config.storage.backend {
        StorageBackendKind::Memory => {
            result = result.with_warning(
                ValidationIssue::new(
                    "storage.backend",
                    "Agent records are kept in memory and lost on restart",
                )
                .with_suggestion("Set storage.backend to \"file\" to persist agents"),
            );
        }
        StorageBackendKind::File => {
            let path = config.storage.resolved_path();
            if path.exists() && !path.is_dir() {
                result = result.with_error(ValidationIssue::new(
                    "storage.path",
                    format!("{} exists and is not a directory", path.display()),
                ));
            }
        }
    }

    result
}

fn validate_client_config(
    config: &Config,
    mut result: ConfigValidationResult,
) -> ConfigValidationResult {
    match url::Url::parse(&config.client.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => {
            result = result.with_error(
                ValidationIssue::new(
                    "client.base_url",
                    format!("Unsupported scheme: {}", url.scheme()),
                )
                .with_suggestion("Use an http:// or https:// URL"),
            );
        }
        Err(e) => {
            result = result.with_error(ValidationIssue::new(
                "client.base_url",
                format!("Invalid URL: {}", e),
            ));
        }
    }

    if config.client.keepalive_interval.is_zero() {
        result = result.with_error(ValidationIssue::new(
            "client.keepalive_interval",
            "Keep-alive interval must be positive",
        ));
    }

    result
}
