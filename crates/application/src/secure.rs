//! Secure-value vault bridge
//!
//! Secure variables do not carry their value inline; they carry an opaque
//! `secure:<uuid>` reference while the value lives in the encrypted store
//! under `missio:secure:<uuid>`.

use std::sync::Arc;

use uuid::Uuid;

use crate::ports::{SecretStore, StoreError};

/// Prefix of a secure-value reference held in a variable.
const SECURE_REF_PREFIX: &str = "secure:";

/// Store key namespace for secure values.
const SECURE_KEY_NAMESPACE: &str = "missio:secure:";

/// Bridge between `secure:<uuid>` references and the encrypted store.
#[derive(Clone)]
pub struct SecureStore {
    store: Arc<dyn SecretStore>,
}

impl SecureStore {
    /// Creates a bridge over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Generates a fresh `secure:<uuid>` reference.
    #[must_use]
    pub fn generate_secure_ref() -> String {
        format!("{SECURE_REF_PREFIX}{}", Uuid::new_v4())
    }

    /// Extracts the UUID from a `secure:<uuid>` reference, or `None` when
    /// `value` is not a well-formed reference.
    #[must_use]
    pub fn extract_secure_id(value: &str) -> Option<Uuid> {
        let raw = value.strip_prefix(SECURE_REF_PREFIX)?;
        Uuid::parse_str(raw).ok()
    }

    /// Stores a secure value and returns the reference to embed in the
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store rejects the write.
    pub async fn store(&self, value: &str) -> Result<String, StoreError> {
        let reference = Self::generate_secure_ref();
        // extract never fails on a reference we just generated
        if let Some(id) = Self::extract_secure_id(&reference) {
            self.store.set(&key_for(id), value).await?;
        }
        Ok(reference)
    }

    /// Resolves a `secure:<uuid>` reference to its stored value.
    ///
    /// Returns `None` for malformed references and for references whose
    /// value is missing from the store.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    pub async fn get(&self, reference: &str) -> Result<Option<String>, StoreError> {
        let Some(id) = Self::extract_secure_id(reference) else {
            return Ok(None);
        };
        self.store.get(&key_for(id)).await
    }

    /// Deletes the value behind a `secure:<uuid>` reference. Malformed
    /// references and absent values are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store rejects the delete.
    pub async fn delete(&self, reference: &str) -> Result<(), StoreError> {
        if let Some(id) = Self::extract_secure_id(reference) {
            self.store.delete(&key_for(id)).await?;
        }
        Ok(())
    }
}

fn key_for(id: Uuid) -> String {
    format!("{SECURE_KEY_NAMESPACE}{id}")
}
