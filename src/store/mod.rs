//! Store module - durable per-agent records
//!
//! Provides the persistence seam agent sessions write their identity through:
//! - `AgentStorage`: async key/value backend, namespaced by agent id
//! - `MemoryStorage`: process-lifetime backend (default)
//! - `FileStorage`: one JSON document per agent under a directory
//!
//! Sessions never talk to a backend directly; they hold an `AgentStore`
//! scoped to their own id, so one agent cannot read another's keys.

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{StorageBackendKind, StorageConfig};
use crate::error::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Abstract interface for durable agent state
///
/// Implement this trait for persistence backends.
#[async_trait]
pub trait AgentStorage: Send + Sync {
    /// Get the backend ID
    fn id(&self) -> &str;

    /// Store a value under `key` for one agent
    async fn put(&self, agent_id: &str, key: &str, value: Value) -> Result<()>;

    /// Retrieve a value stored for one agent
    async fn get(&self, agent_id: &str, key: &str) -> Result<Option<Value>>;

    /// Whether anything has been stored for this agent
    async fn exists(&self, agent_id: &str) -> Result<bool>;

    /// Health check
    async fn health_check(&self) -> Result<bool>;
}

/// A storage handle scoped to a single agent
#[derive(Clone)]
pub struct AgentStore {
    backend: Arc<dyn AgentStorage>,
    agent_id: String,
}

impl AgentStore {
    pub fn new(backend: Arc<dyn AgentStorage>, agent_id: impl Into<String>) -> Self {
        AgentStore {
            backend,
            agent_id: agent_id.into(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Serialize and store a value
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend.put(&self.agent_id, key, value).await
    }

    /// Load and deserialize a value, `None` if the key was never written
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(&self.agent_id, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for AgentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentStore")
            .field("backend", &self.backend.id())
            .field("agent_id", &self.agent_id)
            .finish()
    }
}

/// Build the backend selected by configuration
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn AgentStorage>> {
    match config.backend {
        StorageBackendKind::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackendKind::File => {
            let root = config.resolved_path();
            tracing::info!(path = %root.display(), "Using file-backed agent storage");
            Ok(Arc::new(FileStorage::new(root)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scoped_store_isolates_agents() {
        let backend: Arc<dyn AgentStorage> = Arc::new(MemoryStorage::new());
        let first = AgentStore::new(backend.clone(), "agent-1-a");
        let second = AgentStore::new(backend.clone(), "agent-2-b");

        first.put("name", "calc").await.unwrap();

        assert_eq!(
            first.get::<String>("name").await.unwrap().as_deref(),
            Some("calc")
        );
        assert!(second.get::<String>("name").await.unwrap().is_none());
        assert!(backend.exists("agent-1-a").await.unwrap());
        assert!(!backend.exists("agent-2-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_typed_get_rejects_wrong_shape() {
        let store = AgentStore::new(Arc::new(MemoryStorage::new()), "agent-1-a");
        store.put("name", &42).await.unwrap();
        assert!(store.get::<String>("name").await.is_err());
    }

    #[test]
    fn test_create_storage_memory_default() {
        let storage = create_storage(&StorageConfig::default()).unwrap();
        assert_eq!(storage.id(), "memory");
    }

    #[test]
    fn test_create_storage_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackendKind::File,
            path: Some(dir.path().join("agents")),
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.id(), "file");
    }
}
