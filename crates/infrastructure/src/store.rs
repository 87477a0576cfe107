//! Secret store adapters
//!
//! [`FileSecretStore`] keeps the key/value map in a single JSON file. The
//! file should sit in a user-private directory and be excluded from version
//! control; it stands in for an OS keychain on platforms without one.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use missio_application::ports::{SecretStore, StoreError};

/// [`SecretStore`] persisted as a JSON object in one file.
///
/// Writes are serialized through a mutex; each mutation rewrites the whole
/// file. A missing file reads as an empty store.
pub struct FileSecretStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSecretStore {
    /// Creates a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|err| StoreError::Corrupt(err.to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(StoreError::Io(err.to_string())),
        }
    }

    async fn save(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(values)
            .map_err(|err| StoreError::Io(err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::Io(err.to_string()))?;
        }
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|err| StoreError::Io(err.to_string()))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load().await?.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}

/// In-memory [`SecretStore`], for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}
