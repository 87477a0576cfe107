//! Secret provider descriptors

use serde::{Deserialize, Serialize};

/// Backend type of a secret provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretProviderKind {
    /// Azure Key Vault.
    #[serde(rename = "azure-keyvault")]
    AzureKeyVault,
    /// An unrecognized provider type. Always resolves to nothing.
    #[serde(untagged)]
    Other(String),
}

impl SecretProviderKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AzureKeyVault => "azure-keyvault",
            Self::Other(name) => name,
        }
    }
}

/// A secret provider configured on a collection.
///
/// `$secret.<name>.<secret>` references dispatch to the provider with the
/// matching (unique within the collection) name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretProvider {
    /// Provider name, unique within its collection.
    pub name: String,

    /// Backend type.
    #[serde(rename = "type")]
    pub kind: SecretProviderKind,

    /// Vault URL. May contain `{{var}}` placeholders resolved against the
    /// merged variable map before dispatch.
    pub url: String,

    /// Disabled providers never resolve anything.
    #[serde(default)]
    pub disabled: bool,
}

impl SecretProvider {
    /// Creates a new Azure Key Vault provider.
    #[must_use]
    pub fn azure_key_vault(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SecretProviderKind::AzureKeyVault,
            url: url.into(),
            disabled: false,
        }
    }

    /// Marks this provider as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}
