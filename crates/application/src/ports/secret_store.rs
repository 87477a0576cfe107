//! Secure key/value store port

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the secure store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be read or written.
    #[error("secure store I/O failed: {0}")]
    Io(String),

    /// The stored payload could not be decoded.
    #[error("secure store payload is corrupt: {0}")]
    Corrupt(String),
}

/// Port for the encrypted key/value store backing secure values and cached
/// OAuth2 tokens.
///
/// Keys are namespaced strings such as `missio:secure:<uuid>` or
/// `missio:oauth2:<...>`. The store treats them as opaque.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Stores a value under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Retrieves the value stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Deletes the value stored under `key`. Deleting an absent key is not
    /// an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
