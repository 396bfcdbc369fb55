//! Settings store implementations

use crate::domain::push::SettingsStore;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Process-local settings, lost on restart
#[derive(Default, Clone)]
pub struct MemorySettingsStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings kept in a flat JSON object on disk
pub struct JsonFileSettingsStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: RwLock<()>,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                error!("Settings file {} is corrupt: {}", self.path.display(), e);
                DomainError::Internal(format!("Corrupt settings file: {}", e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(DomainError::Internal(format!(
                "Failed to read settings: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.read().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());

        let bytes = serde_json::to_vec_pretty(&values)
            .map_err(|e| DomainError::Internal(format!("Failed to encode settings: {}", e)))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to write settings: {}", e)))?;

        debug!("Setting {} saved to {}", key, self.path.display());
        Ok(())
    }
}
