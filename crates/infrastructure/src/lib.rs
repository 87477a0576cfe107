//! Missio infrastructure layer
//!
//! Adapters implementing the application layer's ports: system clock,
//! reqwest-backed token endpoint, loopback authorization listener, system
//! browser, tokio file system, file/memory secret stores and the Azure CLI
//! Key Vault backend.

pub mod auth;
pub mod clock;
pub mod fs;
pub mod http;
pub mod store;
pub mod vault;

pub use auth::{LoopbackListener, SystemBrowser};
pub use clock::SystemClock;
pub use fs::TokioFileSystem;
pub use http::ReqwestTokenEndpoint;
pub use store::{FileSecretStore, MemorySecretStore};
pub use vault::AzureCliKeyVaultBackend;
