//! Secret vault backend port

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised when talking to an external secret vault.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The vault rejected the caller's credentials.
    #[error("not authenticated against vault {url}: {reason}")]
    NotAuthenticated {
        /// Vault URL.
        url: String,
        /// Backend-specific detail.
        reason: String,
    },

    /// The vault request failed.
    #[error("vault request to {url} failed: {reason}")]
    Backend {
        /// Vault URL.
        url: String,
        /// Backend-specific detail.
        reason: String,
    },

    /// The backend returned a payload that could not be parsed.
    #[error("vault response from {url} could not be parsed: {reason}")]
    InvalidResponse {
        /// Vault URL.
        url: String,
        /// Backend-specific detail.
        reason: String,
    },
}

/// Port for fetching secrets from an external vault such as Azure Key Vault.
///
/// One implementation exists per [`SecretProviderKind`]; the resolver
/// dispatches on the provider's kind.
///
/// [`SecretProviderKind`]: missio_domain::SecretProviderKind
#[async_trait]
pub trait SecretVaultBackend: Send + Sync {
    /// Fetches the value of a single secret, or `None` when the vault has no
    /// secret with that name.
    async fn fetch_secret(&self, url: &str, name: &str) -> Result<Option<String>, SecretError>;

    /// Lists the names of all secrets in the vault.
    async fn list_secret_names(&self, url: &str) -> Result<Vec<String>, SecretError>;
}
