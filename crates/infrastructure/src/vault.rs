//! Azure Key Vault backend via the `az` CLI
//!
//! Reuses the user's existing `az login` session instead of carrying its
//! own Azure credential plumbing.

use async_trait::async_trait;
use tokio::process::Command;
use url::Url;

use missio_application::ports::{SecretError, SecretVaultBackend};

/// [`SecretVaultBackend`] shelling out to the Azure CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureCliKeyVaultBackend;

#[async_trait]
impl SecretVaultBackend for AzureCliKeyVaultBackend {
    async fn fetch_secret(&self, url: &str, name: &str) -> Result<Option<String>, SecretError> {
        let id = secret_id(url, name);
        let output = Command::new("az")
            .args([
                "keyvault",
                "secret",
                "show",
                "--id",
                id.as_str(),
                "--query",
                "value",
                "--output",
                "tsv",
            ])
            .output()
            .await
            .map_err(|err| SecretError::Backend {
                url: url.to_string(),
                reason: format!("az CLI unavailable: {err}"),
            })?;

        if output.status.success() {
            let value = String::from_utf8_lossy(&output.stdout)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            return Ok(Some(value));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if is_not_found(&stderr) {
            return Ok(None);
        }
        Err(classify_failure(url, stderr))
    }

    async fn list_secret_names(&self, url: &str) -> Result<Vec<String>, SecretError> {
        let vault = vault_name(url).ok_or_else(|| SecretError::Backend {
            url: url.to_string(),
            reason: "vault URL has no recognizable host".to_string(),
        })?;

        let output = Command::new("az")
            .args([
                "keyvault",
                "secret",
                "list",
                "--vault-name",
                vault.as_str(),
                "--query",
                "[].name",
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|err| SecretError::Backend {
                url: url.to_string(),
                reason: format!("az CLI unavailable: {err}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(classify_failure(url, stderr));
        }

        serde_json::from_slice(&output.stdout).map_err(|err| SecretError::InvalidResponse {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Full secret identifier: `<vault-url>/secrets/<name>`.
fn secret_id(url: &str, name: &str) -> String {
    format!("{}/secrets/{name}", url.trim_end_matches('/'))
}

/// First host label of the vault URL, which is the vault's name in Azure
/// (`https://myvault.vault.azure.net` -> `myvault`).
fn vault_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    host.split('.').next().map(ToString::to_string)
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains("SecretNotFound") || stderr.contains("was not found")
}

fn classify_failure(url: &str, stderr: String) -> SecretError {
    let reason = stderr.lines().next().unwrap_or("az CLI failed").to_string();
    if stderr.contains("az login") || stderr.contains("AADSTS") {
        SecretError::NotAuthenticated {
            url: url.to_string(),
            reason,
        }
    } else {
        SecretError::Backend {
            url: url.to_string(),
            reason,
        }
    }
}
