//! In-memory agent storage

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::AgentStorage;
use crate::error::Result;

/// Process-lifetime storage; records are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    agents: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStorage for MemoryStorage {
    fn id(&self) -> &str {
        "memory"
    }

    async fn put(&self, agent_id: &str, key: &str, value: Value) -> Result<()> {
        self.agents
            .write()
            .await
            .entry(agent_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, agent_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .agents
            .read()
            .await
            .get(agent_id)
            .and_then(|doc| doc.get(key).cloned()))
    }

    async fn exists(&self, agent_id: &str) -> Result<bool> {
        Ok(self.agents.read().await.contains_key(agent_id))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_overwrites_key() {
        let storage = MemoryStorage::new();
        storage.put("agent-1-a", "name", json!("one")).await.unwrap();
        storage.put("agent-1-a", "name", json!("two")).await.unwrap();
        assert_eq!(
            storage.get("agent-1-a", "name").await.unwrap(),
            Some(json!("two"))
        );
        assert!(storage.get("agent-1-a", "missing").await.unwrap().is_none());
        assert!(storage.health_check().await.unwrap());
    }
}
