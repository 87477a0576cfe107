//! OAuth2 token lifecycle
//!
//! Fetches, caches, refreshes and invalidates bearer tokens per
//! (collection, environment, token URL, credentials) tuple.

mod key;
mod manager;
mod pkce;

pub use key::{index_key, token_store_key};
pub use manager::{TokenManager, AUTHORIZATION_TIMEOUT_SECS};
pub use pkce::{generate_state, PkcePair};
