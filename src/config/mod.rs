//! Configuration module - Modular configuration management
//!
//! - types/mod.rs: Core configuration types (Config, GatewayConfig, SessionConfig)
//! - types/storage.rs: Storage backend configuration
//! - types/client.rs: Client and CLI configuration
//! - io.rs: Configuration loading, environment overrides and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{Config, GatewayConfig, SessionConfig};

// Re-export storage types
pub use types::storage::{StorageBackendKind, StorageConfig};

// Re-export client types
pub use types::client::ClientConfig;

// Re-export IO and utilities
pub use io::{
    apply_env_overrides, apply_overrides, load_config, load_config_from_path, load_config_with,
    save_config,
};
pub use paths::{config_dir, config_path, state_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
