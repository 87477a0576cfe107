//! Token store key construction

use missio_domain::OAuth2Config;

/// Sentinel used in the key when no environment is active.
const NO_ENVIRONMENT: &str = "-";

/// Builds the store key a token is cached under.
///
/// One token is kept per (collection, environment, token URL, credentials)
/// tuple, so switching environments or credential sets never hands out a
/// token minted for a different one.
#[must_use]
pub fn token_store_key(
    collection_id: &str,
    env_name: Option<&str>,
    config: &OAuth2Config,
) -> String {
    format!(
        "missio:oauth2:{collection_id}:{}:{}:{}",
        env_name.unwrap_or(NO_ENVIRONMENT),
        config.access_token_url,
        config.effective_credentials_id()
    )
}

/// Builds the key of the per-collection index listing every token key
/// stored for that collection. The index is what makes "clear all tokens"
/// possible over a store that cannot enumerate keys.
#[must_use]
pub fn index_key(collection_id: &str) -> String {
    format!("missio:oauth2:index:{collection_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_key_embeds_all_four_parts() {
        let config = OAuth2Config::client_credentials("https://auth/token", "cli");
        assert_eq!(
            token_store_key("col-1", Some("dev"), &config),
            "missio:oauth2:col-1:dev:https://auth/token:default"
        );
    }

    #[test]
    fn test_missing_environment_uses_sentinel() {
        let config = OAuth2Config::client_credentials("https://auth/token", "cli");
        assert_eq!(
            token_store_key("col-1", None, &config),
            "missio:oauth2:col-1:-:https://auth/token:default"
        );
    }

    #[test]
    fn test_credentials_id_differentiates_keys() {
        let mut config = OAuth2Config::client_credentials("https://auth/token", "cli");
        config.credentials_id = Some("admin".to_string());
        let admin = token_store_key("col-1", Some("dev"), &config);
        config.credentials_id = None;
        let default = token_store_key("col-1", Some("dev"), &config);
        assert_ne!(admin, default);
    }
}
