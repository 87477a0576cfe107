//! Environment types

use serde::{Deserialize, Serialize};

use crate::variable::Variable;

/// A named set of variables, optionally extending one sibling environment
/// and optionally pulling extra variables from a dotenv file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment name (looked up case-sensitively).
    pub name: String,

    /// Variables defined by this environment, in declaration order.
    #[serde(default)]
    pub variables: Vec<Variable>,

    /// Name of the parent environment in the same collection. Only one hop
    /// is resolved; a parent's own `extends` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Path to a dotenv file, relative to the collection root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dot_env_file_path: Option<String>,
}

impl Environment {
    /// Creates a new empty environment.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            extends: None,
            dot_env_file_path: None,
        }
    }

    /// Sets the parent environment name.
    #[must_use]
    pub fn with_extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Sets the dotenv file path (relative to the collection root).
    #[must_use]
    pub fn with_dotenv(mut self, path: impl Into<String>) -> Self {
        self.dot_env_file_path = Some(path.into());
        self
    }

    /// Adds a variable to this environment.
    #[must_use]
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Appends a variable.
    pub fn push_variable(&mut self, variable: Variable) {
        self.variables.push(variable);
    }

    /// Finds a variable by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Iterates over the non-secret variables in declaration order.
    pub fn plain_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| !v.secret)
    }

    /// Iterates over the secret variables in declaration order.
    pub fn secret_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.secret)
    }
}
