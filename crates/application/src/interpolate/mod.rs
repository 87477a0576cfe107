//! Placeholder interpolation
//!
//! Replaces `{{name}}` placeholders against a variable map, with built-in
//! dynamic values (`{{$guid}}`, `{{$timestamp}}`, `{{$randomInt}}`).
//! Template interpolation is a single scan; the variable map itself is
//! resolved to a fixpoint separately so nested placeholders flatten there.

mod builtins;
mod engine;
mod parser;

pub use builtins::resolve_builtin;
pub use engine::{interpolate, interpolate_values, MAX_PASSES};
pub use parser::{find_placeholders, PlaceholderRef};
