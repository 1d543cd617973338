//! File-backed agent storage
//!
//! Each agent's keys live in `<root>/<agent_id>.json`. Writes go through a
//! temporary file and a rename so a crash never leaves a torn document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::AgentStorage;
use crate::error::{Error, Result};

/// One JSON document per agent under a directory
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open (and create if needed) the storage directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::Storage(format!("Cannot create {}: {}", root.display(), e))
        })?;
        Ok(FileStorage {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, agent_id: &str) -> Result<PathBuf> {
        let safe = !agent_id.is_empty()
            && agent_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !safe {
            return Err(Error::Storage(format!(
                "Agent id not usable as a file name: {:?}",
                agent_id
            )));
        }
        Ok(self.root.join(format!("{agent_id}.json")))
    }

    async fn read_document(&self, path: &Path) -> Result<Option<Map<String, Value>>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let doc = serde_json::from_str(&content).map_err(|e| {
                    Error::Storage(format!("Corrupt document {}: {}", path.display(), e))
                })?;
                Ok(Some(doc))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "Cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl AgentStorage for FileStorage {
    fn id(&self) -> &str {
        "file"
    }

    async fn put(&self, agent_id: &str, key: &str, value: Value) -> Result<()> {
        let path = self.document_path(agent_id)?;
        let _guard = self.write_lock.lock().await;

        let mut doc = self.read_document(&path).await?.unwrap_or_default();
        doc.insert(key.to_string(), value);

        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&doc)?;
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::Storage(format!("Cannot write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Storage(format!("Cannot replace {}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn get(&self, agent_id: &str, key: &str) -> Result<Option<Value>> {
        let path = self.document_path(agent_id)?;
        Ok(self
            .read_document(&path)
            .await?
            .and_then(|mut doc| doc.remove(key)))
    }

    async fn exists(&self, agent_id: &str) -> Result<bool> {
        let path = self.document_path(agent_id)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }
}
