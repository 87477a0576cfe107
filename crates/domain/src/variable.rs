//! Variable and value expression types

use serde::{Deserialize, Serialize};

/// The value side of a variable.
///
/// Configuration files allow three shapes: a plain string, a typed value
/// whose `data` field carries the effective text, or an ordered list of
/// selectable variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueExpr {
    /// A literal string value.
    Literal(String),
    /// A typed value; `data` is the effective string.
    Typed {
        /// Declared value type (informational).
        #[serde(rename = "type")]
        value_type: String,
        /// The effective string value.
        data: String,
    },
    /// An ordered list of variants; the selected one (or the first) applies.
    Variants(Vec<ValueVariant>),
}

impl ValueExpr {
    /// Creates a literal value expression.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Resolves the expression to its effective text.
    ///
    /// Variant lists pick the first variant with `selected = true`, falling
    /// back to index 0, and recurse into the chosen variant's value. An
    /// empty variant list resolves to `None`.
    #[must_use]
    pub fn effective_text(&self) -> Option<&str> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Typed { data, .. } => Some(data),
            Self::Variants(variants) => variants
                .iter()
                .find(|v| v.selected)
                .or_else(|| variants.first())
                .and_then(|v| v.value.effective_text()),
        }
    }
}

impl Default for ValueExpr {
    fn default() -> Self {
        Self::Literal(String::new())
    }
}

impl From<&str> for ValueExpr {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for ValueExpr {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

/// One entry in a variant-list value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueVariant {
    /// Human-readable label for this variant.
    pub title: String,
    /// The variant's value (may itself be a variant list).
    pub value: ValueExpr,
    /// Whether this variant is the selected one.
    #[serde(default)]
    pub selected: bool,
}

impl ValueVariant {
    /// Creates a new unselected variant.
    #[must_use]
    pub fn new(title: impl Into<String>, value: impl Into<ValueExpr>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            selected: false,
        }
    }

    /// Marks this variant as selected.
    #[must_use]
    pub const fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

/// A named variable as it appears in a configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// The variable name (referenced as `{{name}}`).
    pub name: String,

    /// The variable value. For `secure` secret variables this holds a
    /// `secure:<uuid>` reference, never the plaintext.
    #[serde(default)]
    pub value: ValueExpr,

    /// Whether this variable is a secret.
    #[serde(default)]
    pub secret: bool,

    /// For secret variables: whether the value is a `secure:` reference
    /// into the opaque secret store. When false the secret text is stored
    /// directly (unencrypted).
    #[serde(default)]
    pub secure: bool,

    /// Disabled variables are skipped entirely during resolution.
    #[serde(default)]
    pub disabled: bool,
}

impl Variable {
    /// Creates a new plain variable.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<ValueExpr>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: false,
            secure: false,
            disabled: false,
        }
    }

    /// Creates a secret variable with the secret text stored in place.
    #[must_use]
    pub fn secret(name: impl Into<String>, value: impl Into<ValueExpr>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: true,
            secure: false,
            disabled: false,
        }
    }

    /// Creates a secure secret variable holding a `secure:<uuid>` reference.
    #[must_use]
    pub fn secure_ref(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ValueExpr::Literal(reference.into()),
            secret: true,
            secure: true,
            disabled: false,
        }
    }

    /// Marks this variable as disabled.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Resolves the effective text of this variable's value.
    #[must_use]
    pub fn effective_value(&self) -> Option<&str> {
        self.value.effective_text()
    }
}

/// The configuration layer a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableSource {
    /// Process-wide global variables (lowest precedence).
    Global,
    /// Collection-level default variables.
    Collection,
    /// Folder-level default variables.
    Folder,
    /// Variables from the active environment (or its parent).
    Environment,
    /// Variables loaded from the environment's dotenv file.
    Dotenv,
    /// Secret variables, or values rewritten by secret-reference substitution.
    Secret,
}

impl VariableSource {
    /// Returns a human-readable name for the source.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Collection => "Collection",
            Self::Folder => "Folder",
            Self::Environment => "Environment",
            Self::Dotenv => "Dotenv",
            Self::Secret => "Secret",
        }
    }
}

/// A resolved variable value together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    /// The resolved string value.
    pub value: String,
    /// The last layer that wrote this value.
    pub source: VariableSource,
}

impl ResolvedValue {
    /// Creates a new resolved value.
    #[must_use]
    pub fn new(value: impl Into<String>, source: VariableSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }
}
