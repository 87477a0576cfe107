//! Collection, request defaults and globals

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::auth::OAuth2Config;
use crate::environment::Environment;
use crate::secret_provider::SecretProvider;
use crate::variable::Variable;

/// Authentication attached to collection or folder defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestAuth {
    /// Inherit auth from the enclosing layer.
    Inherit,
    /// OAuth2 bearer token acquisition.
    Oauth2(OAuth2Config),
}

/// Defaults applied to requests at the collection or folder level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestDefaults {
    /// Default variables for this layer, in declaration order.
    #[serde(default)]
    pub variables: Vec<Variable>,

    /// Default authentication for this layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<RequestAuth>,
}

impl RequestDefaults {
    /// Creates empty defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a default variable.
    #[must_use]
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }
}

/// A collection of requests with its environments and secret providers.
///
/// File discovery and YAML round-tripping live outside this core; a
/// `Collection` is the already-loaded view the resolution engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Stable collection identifier (used in token cache keys).
    pub id: String,

    /// Collection root directory; dotenv paths resolve relative to this.
    pub root: PathBuf,

    /// Collection-level request defaults.
    #[serde(default)]
    pub request: RequestDefaults,

    /// Environments defined in this collection.
    #[serde(default)]
    pub environments: Vec<Environment>,

    /// Secret providers configured for this collection.
    #[serde(default)]
    pub secret_providers: Vec<SecretProvider>,

    /// Name of the currently active environment, if any. A name that does
    /// not match any defined environment is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_environment: Option<String>,
}

impl Collection {
    /// Creates a new empty collection.
    #[must_use]
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            request: RequestDefaults::default(),
            environments: Vec::new(),
            secret_providers: Vec::new(),
            active_environment: None,
        }
    }

    /// Adds an environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environments.push(environment);
        self
    }

    /// Adds a secret provider.
    #[must_use]
    pub fn with_secret_provider(mut self, provider: SecretProvider) -> Self {
        self.secret_providers.push(provider);
        self
    }

    /// Sets the active environment name.
    #[must_use]
    pub fn with_active_environment(mut self, name: impl Into<String>) -> Self {
        self.active_environment = Some(name.into());
        self
    }

    /// Adds a collection-level default variable.
    #[must_use]
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.request.variables.push(variable);
        self
    }

    /// Finds an environment by exact name.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// Returns the active environment, or `None` when none is set or the
    /// name matches no defined environment.
    #[must_use]
    pub fn active_environment(&self) -> Option<&Environment> {
        self.active_environment
            .as_deref()
            .and_then(|name| self.environment(name))
    }
}

/// Process-wide variables, not tied to any collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Globals {
    /// Global variables, in declaration order.
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Globals {
    /// Creates an empty globals set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a global variable.
    #[must_use]
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_active_environment_lookup() {
        let collection = Collection::new("col-1", "/tmp/col")
            .with_environment(Environment::new("dev"))
            .with_active_environment("dev");

        assert_eq!(collection.active_environment().map(|e| e.name.as_str()), Some("dev"));
    }

    #[test]
    fn test_unknown_active_environment_is_ignored() {
        let collection = Collection::new("col-1", "/tmp/col")
            .with_environment(Environment::new("dev"))
            .with_active_environment("production");

        assert!(collection.active_environment().is_none());
    }

    #[test]
    fn test_environment_names_are_case_sensitive() {
        let collection = Collection::new("col-1", "/tmp/col")
            .with_environment(Environment::new("Dev"))
            .with_active_environment("dev");

        assert!(collection.active_environment().is_none());
    }

    #[test]
    fn test_defaults_collect_variables() {
        let defaults = RequestDefaults::new()
            .with_variable(Variable::new("a", "1"))
            .with_variable(Variable::new("b", "2"));
        assert_eq!(defaults.variables.len(), 2);
    }
}
