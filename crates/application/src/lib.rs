//! Missio application layer
//!
//! Use cases for variable resolution, placeholder interpolation, secret
//! resolution and OAuth2 token management. Business rules live here; I/O is
//! delegated to ports implemented by the infrastructure layer.

pub mod interpolate;
pub mod oauth2;
pub mod ports;
pub mod resolver;
pub mod secrets;
pub mod secure;

pub use interpolate::{interpolate, interpolate_values};
pub use oauth2::TokenManager;
pub use resolver::VariableEngine;
pub use secrets::SecretResolver;
pub use secure::SecureStore;
