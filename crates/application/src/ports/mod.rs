//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the resolution engines and external
//! systems. Each port is a trait implemented by an adapter in the
//! infrastructure layer.

mod clock;
mod file_system;
mod oauth_transport;
mod secret_store;
mod vault_backend;

pub use clock::Clock;
pub use file_system::{FileSystem, FileSystemError};
pub use oauth_transport::{
    AuthorizationListener, BrowserLauncher, CallbackParams, CancellationReceiver,
    CancellationToken, PendingAuthorization, TokenEndpoint,
};
pub use secret_store::{SecretStore, StoreError};
pub use vault_backend::{SecretError, SecretVaultBackend};
