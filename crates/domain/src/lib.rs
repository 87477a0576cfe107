//! Missio Domain - Core business types
//!
//! This crate defines the domain model for the Missio variable resolution
//! and OAuth2 token core. All types here are pure Rust with no I/O
//! dependencies.

pub mod auth;
pub mod collection;
pub mod environment;
pub mod secret_provider;
pub mod variable;

pub use auth::{
    AuthError, CredentialsPlacement, OAuth2Config, OAuth2Flow, OAuth2TokenData, TokenStatus,
};
pub use collection::{Collection, Globals, RequestAuth, RequestDefaults};
pub use environment::Environment;
pub use secret_provider::{SecretProvider, SecretProviderKind};
pub use variable::{ResolvedValue, ValueExpr, ValueVariant, Variable, VariableSource};
