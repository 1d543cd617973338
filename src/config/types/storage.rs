//! Storage configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend holding agent records
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Directory for the file backend; defaults to `<state_dir>/agents`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory the file backend writes to
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| crate::config::state_dir().join("agents"))
    }
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Process lifetime only (default)
    #[default]
    Memory,
    /// One JSON document per agent on disk
    File,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackendKind::Memory),
            "file" => Ok(StorageBackendKind::File),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

impl std::fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendKind::Memory => write!(f, "memory"),
            StorageBackendKind::File => write!(f, "file"),
        }
    }
}
