//! Variable merge engine
//!
//! Merges the configuration layers into a single variable map with
//! provenance, resolves placeholders and substitutes secret references.

mod dotenv;
mod engine;

pub use dotenv::parse_dotenv;
pub use engine::VariableEngine;
