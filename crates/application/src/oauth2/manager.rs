//! Token acquisition state machine

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use missio_domain::{
    AuthError, CredentialsPlacement, OAuth2Config, OAuth2Flow, OAuth2TokenData, TokenStatus,
};

use crate::ports::{
    AuthorizationListener, BrowserLauncher, CancellationReceiver, Clock, SecretStore, TokenEndpoint,
};

use super::key::{index_key, token_store_key};
use super::pkce::{generate_state, PkcePair};

/// How long the authorization code flow waits for the browser callback.
pub const AUTHORIZATION_TIMEOUT_SECS: u64 = 120;

/// Manages the OAuth2 token lifecycle over a persistent store.
///
/// Per storage key a token moves NoToken -> Valid -> Expired and back to
/// Valid (after refresh or re-fetch) or NoToken (failed refresh, explicit
/// clear). Concurrent acquisitions for the same key may both hit the
/// network; last writer wins, and both writers hold a valid token.
pub struct TokenManager {
    store: Arc<dyn SecretStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    listener: Arc<dyn AuthorizationListener>,
    browser: Arc<dyn BrowserLauncher>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    /// Creates a token manager over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn SecretStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        listener: Arc<dyn AuthorizationListener>,
        browser: Arc<dyn BrowserLauncher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            endpoint,
            listener,
            browser,
            clock,
        }
    }

    /// Returns a usable token for the configuration, fetching or refreshing
    /// as needed.
    ///
    /// Returns `Ok(None)` only when nothing usable is stored and
    /// `auto_fetch_token` is disabled.
    ///
    /// # Errors
    ///
    /// Returns configuration errors before any network call, and fetch
    /// failures from the token endpoint or the interactive authorization.
    pub async fn get_token(
        &self,
        config: &OAuth2Config,
        collection_id: &str,
        env_name: Option<&str>,
    ) -> Result<Option<OAuth2TokenData>, AuthError> {
        self.get_token_with_cancellation(
            config,
            collection_id,
            env_name,
            CancellationReceiver::never(),
        )
        .await
    }

    /// Like [`Self::get_token`], with a cancellation handle for the
    /// interactive authorization code flow.
    ///
    /// # Errors
    ///
    /// See [`Self::get_token`]; additionally fails with
    /// [`AuthError::Cancelled`] when `cancel` fires during the wait.
    pub async fn get_token_with_cancellation(
        &self,
        config: &OAuth2Config,
        collection_id: &str,
        env_name: Option<&str>,
        cancel: CancellationReceiver,
    ) -> Result<Option<OAuth2TokenData>, AuthError> {
        let key = token_store_key(collection_id, env_name, config);

        if let Some(stored) = self.load_token(&key).await? {
            if !stored.is_expired(self.clock.now()) {
                return Ok(Some(stored));
            }

            if config.auto_refresh_token && stored.can_refresh() {
                match self.refresh_token(config, &stored).await {
                    Ok(refreshed) => {
                        self.persist_token(collection_id, &key, &refreshed).await?;
                        return Ok(Some(refreshed));
                    }
                    Err(err) => {
                        log::warn!("token refresh for '{key}' failed, re-fetching: {err}");
                    }
                }
            }
            // Refresh not attempted or failed: the expired record is useless.
            self.store
                .delete(&key)
                .await
                .map_err(|err| AuthError::Storage(err.to_string()))?;
        }

        if !config.auto_fetch_token {
            return Ok(None);
        }

        let token = self.fetch_token(config, cancel).await?;
        self.persist_token(collection_id, &key, &token).await?;
        Ok(Some(token))
    }

    /// Reports the stored token's state without touching the network.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store cannot be read.
    pub async fn get_token_status(
        &self,
        config: &OAuth2Config,
        collection_id: &str,
        env_name: Option<&str>,
    ) -> Result<TokenStatus, AuthError> {
        let key = token_store_key(collection_id, env_name, config);
        let status = match self.load_token(&key).await? {
            Some(token) => token.status(self.clock.now()),
            None => TokenStatus::none(),
        };
        Ok(status)
    }

    /// Deletes the stored token for one configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the store rejects the delete.
    pub async fn clear_token(
        &self,
        config: &OAuth2Config,
        collection_id: &str,
        env_name: Option<&str>,
    ) -> Result<(), AuthError> {
        let key = token_store_key(collection_id, env_name, config);
        self.store
            .delete(&key)
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        self.remove_from_index(collection_id, &key).await
    }

    /// Deletes every stored token for a collection, using the per-collection
    /// key index.
    ///
    /// # Errors
    ///
    /// Returns an error when the store rejects a read or delete.
    pub async fn clear_all_tokens(&self, collection_id: &str) -> Result<(), AuthError> {
        for key in self.read_index(collection_id).await? {
            self.store
                .delete(&key)
                .await
                .map_err(|err| AuthError::Storage(err.to_string()))?;
        }
        self.store
            .delete(&index_key(collection_id))
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))
    }

    async fn fetch_token(
        &self,
        config: &OAuth2Config,
        cancel: CancellationReceiver,
    ) -> Result<OAuth2TokenData, AuthError> {
        match &config.flow {
            OAuth2Flow::ClientCredentials => self.fetch_client_credentials(config).await,
            OAuth2Flow::Password => self.fetch_password(config).await,
            OAuth2Flow::AuthorizationCode => self.fetch_authorization_code(config, cancel).await,
            OAuth2Flow::Other(name) => Err(AuthError::UnsupportedFlow(name.clone())),
        }
    }

    async fn fetch_client_credentials(
        &self,
        config: &OAuth2Config,
    ) -> Result<OAuth2TokenData, AuthError> {
        if config.client_id.is_empty() {
            return Err(AuthError::MissingField("client_id"));
        }

        let mut params = vec![("grant_type", "client_credentials")];
        if let Some(scope) = config.scope.as_deref() {
            params.push(("scope", scope));
        }
        self.post_token_request(config, params).await
    }

    async fn fetch_password(&self, config: &OAuth2Config) -> Result<OAuth2TokenData, AuthError> {
        if config.client_id.is_empty() {
            return Err(AuthError::MissingField("client_id"));
        }
        let username = config
            .username
            .as_deref()
            .ok_or(AuthError::MissingField("username"))?;
        let password = config
            .password
            .as_deref()
            .ok_or(AuthError::MissingField("password"))?;

        let mut params = vec![
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ];
        if let Some(scope) = config.scope.as_deref() {
            params.push(("scope", scope));
        }
        self.post_token_request(config, params).await
    }

    async fn fetch_authorization_code(
        &self,
        config: &OAuth2Config,
        cancel: CancellationReceiver,
    ) -> Result<OAuth2TokenData, AuthError> {
        if config.client_id.is_empty() {
            return Err(AuthError::MissingField("client_id"));
        }
        let authorize_url = config
            .authorize_url
            .as_deref()
            .ok_or(AuthError::MissingField("authorize_url"))?;

        // Bind first so the redirect URI is known before the browser opens.
        let pending = self.listener.bind().await?;
        let redirect_uri = pending.redirect_uri();

        let pkce = config.use_pkce.then(PkcePair::generate);
        let state = generate_state();

        let mut auth_url = Url::parse(authorize_url)
            .map_err(|err| AuthError::InvalidConfiguration(format!("authorize_url: {err}")))?;
        {
            let mut query = auth_url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &config.client_id)
                .append_pair("redirect_uri", &redirect_uri)
                .append_pair("state", &state);
            if let Some(scope) = config.scope.as_deref() {
                query.append_pair("scope", scope);
            }
            if let Some(pkce) = &pkce {
                query
                    .append_pair("code_challenge", &pkce.challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }

        self.browser.open(auth_url.as_str())?;

        let callback = pending
            .wait_for_callback(Duration::from_secs(AUTHORIZATION_TIMEOUT_SECS), cancel)
            .await?;

        if let Some(error) = callback.error {
            let detail = callback
                .error_description
                .map_or(error.clone(), |desc| format!("{error}: {desc}"));
            return Err(AuthError::AuthorizationDenied(detail));
        }
        if callback.state.as_deref() != Some(state.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        let code = callback.code.ok_or_else(|| {
            AuthError::AuthorizationDenied("callback carried no authorization code".to_string())
        })?;

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        if let Some(pkce) = &pkce {
            params.push(("code_verifier", pkce.verifier.as_str()));
        }
        self.post_token_request(config, params).await
    }

    async fn refresh_token(
        &self,
        config: &OAuth2Config,
        stored: &OAuth2TokenData,
    ) -> Result<OAuth2TokenData, AuthError> {
        let refresh_token = stored
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingField("refresh_token"))?;
        let params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.post_token_request(config, params).await
    }

    async fn post_token_request(
        &self,
        config: &OAuth2Config,
        mut params: Vec<(&str, &str)>,
    ) -> Result<OAuth2TokenData, AuthError> {
        let basic_auth = match config.credentials_placement {
            CredentialsPlacement::BasicHeader => Some((
                config.client_id.as_str(),
                config.client_secret.as_deref().unwrap_or(""),
            )),
            CredentialsPlacement::Body => {
                params.push(("client_id", config.client_id.as_str()));
                if let Some(secret) = config.client_secret.as_deref() {
                    params.push(("client_secret", secret));
                }
                None
            }
        };

        let body = self
            .endpoint
            .post_form(&config.access_token_url, &params, basic_auth)
            .await?;
        self.parse_token_response(&body)
    }

    /// Normalizes a token endpoint response body.
    ///
    /// A JSON body with an `error` field is a failure regardless of HTTP
    /// status; a body missing `access_token` is malformed. `created_at` is
    /// stamped at receipt.
    fn parse_token_response(&self, body: &str) -> Result<OAuth2TokenData, AuthError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|err| AuthError::InvalidTokenResponse(err.to_string()))?;

        if let Some(error) = value.get("error").and_then(serde_json::Value::as_str) {
            return Err(AuthError::TokenEndpoint {
                error: error.to_string(),
                description: value
                    .get("error_description")
                    .and_then(serde_json::Value::as_str)
                    .map(ToString::to_string),
            });
        }

        let access_token = value
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                AuthError::InvalidTokenResponse("response has no access_token".to_string())
            })?
            .to_string();

        Ok(OAuth2TokenData {
            access_token,
            token_type: value
                .get("token_type")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
            expires_in: expires_in_of(&value),
            refresh_token: value
                .get("refresh_token")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
            scope: value
                .get("scope")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
            created_at: self.clock.now().timestamp_millis(),
        })
    }

    async fn load_token(&self, key: &str) -> Result<Option<OAuth2TokenData>, AuthError> {
        let Some(raw) = self
            .store
            .get(key)
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?
        else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                // A corrupt record behaves like no record at all.
                log::warn!("stored token under '{key}' is unreadable: {err}");
                Ok(None)
            }
        }
    }

    async fn persist_token(
        &self,
        collection_id: &str,
        key: &str,
        token: &OAuth2TokenData,
    ) -> Result<(), AuthError> {
        let raw = serde_json::to_string(token)
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        self.store
            .set(key, &raw)
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        self.add_to_index(collection_id, key).await
    }

    async fn read_index(&self, collection_id: &str) -> Result<Vec<String>, AuthError> {
        let raw = self
            .store
            .get(&index_key(collection_id))
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        Ok(raw
            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
            .unwrap_or_default())
    }

    async fn add_to_index(&self, collection_id: &str, key: &str) -> Result<(), AuthError> {
        let mut keys = self.read_index(collection_id).await?;
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
            self.write_index(collection_id, &keys).await?;
        }
        Ok(())
    }

    async fn remove_from_index(&self, collection_id: &str, key: &str) -> Result<(), AuthError> {
        let mut keys = self.read_index(collection_id).await?;
        let before = keys.len();
        keys.retain(|k| k != key);
        if keys.len() != before {
            self.write_index(collection_id, &keys).await?;
        }
        Ok(())
    }

    async fn write_index(&self, collection_id: &str, keys: &[String]) -> Result<(), AuthError> {
        let raw =
            serde_json::to_string(keys).map_err(|err| AuthError::Storage(err.to_string()))?;
        self.store
            .set(&index_key(collection_id), &raw)
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))
    }
}

fn expires_in_of(value: &serde_json::Value) -> Option<u64> {
    let field = value.get("expires_in")?;
    // Some servers send expires_in as a JSON string.
    field
        .as_u64()
        .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};

    use crate::ports::{CallbackParams, PendingAuthorization, StoreError};

    struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl MemoryStore {
        fn keys(&self) -> Vec<String> {
            self.values.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl SecretStore for MemoryStore {
        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct RecordedRequest {
        url: String,
        params: Vec<(String, String)>,
        basic_auth: Option<(String, String)>,
    }

    #[derive(Default)]
    struct FakeEndpoint {
        responses: Mutex<Vec<String>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl FakeEndpoint {
        fn respond_with(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                // popped from the back, so store reversed
                responses: Mutex::new(responses.iter().rev().map(ToString::to_string).collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenEndpoint for FakeEndpoint {
        async fn post_form(
            &self,
            url: &str,
            params: &[(&str, &str)],
            basic_auth: Option<(&str, &str)>,
        ) -> Result<String, AuthError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                url: url.to_string(),
                params: params
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                basic_auth: basic_auth.map(|(u, p)| (u.to_string(), p.to_string())),
            });
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AuthError::Network("no response queued".to_string()))
        }
    }

    /// Echoes back the state from the URL the fake browser captured, as a
    /// real authorization server would.
    struct FakeListener {
        opened_url: Arc<Mutex<Option<String>>>,
        error: Option<(String, Option<String>)>,
        override_state: Option<String>,
        cancel_instead: bool,
    }

    struct FakePending {
        opened_url: Arc<Mutex<Option<String>>>,
        error: Option<(String, Option<String>)>,
        override_state: Option<String>,
        cancel_instead: bool,
    }

    #[async_trait]
    impl AuthorizationListener for FakeListener {
        async fn bind(&self) -> Result<Box<dyn PendingAuthorization>, AuthError> {
            Ok(Box::new(FakePending {
                opened_url: Arc::clone(&self.opened_url),
                error: self.error.clone(),
                override_state: self.override_state.clone(),
                cancel_instead: self.cancel_instead,
            }))
        }
    }

    #[async_trait]
    impl PendingAuthorization for FakePending {
        fn redirect_uri(&self) -> String {
            "http://127.0.0.1:49152/callback".to_string()
        }

        async fn wait_for_callback(
            self: Box<Self>,
            _timeout: Duration,
            mut cancel: CancellationReceiver,
        ) -> Result<CallbackParams, AuthError> {
            if self.cancel_instead {
                cancel.cancelled().await;
                return Err(AuthError::Cancelled);
            }
            if let Some((error, description)) = self.error {
                return Ok(CallbackParams {
                    error: Some(error),
                    error_description: description,
                    ..CallbackParams::default()
                });
            }

            let opened = self.opened_url.lock().unwrap().clone().unwrap();
            let url = Url::parse(&opened).unwrap();
            let sent_state = url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned());
            Ok(CallbackParams {
                code: Some("auth-code-1".to_string()),
                state: self.override_state.or(sent_state),
                error: None,
                error_description: None,
            })
        }
    }

    struct FakeBrowser {
        opened_url: Arc<Mutex<Option<String>>>,
    }

    impl BrowserLauncher for FakeBrowser {
        fn open(&self, url: &str) -> Result<(), AuthError> {
            *self.opened_url.lock().unwrap() = Some(url.to_string());
            Ok(())
        }
    }

    struct Fixture {
        manager: TokenManager,
        store: Arc<MemoryStore>,
        endpoint: Arc<FakeEndpoint>,
        opened_url: Arc<Mutex<Option<String>>>,
    }

    fn fixture_with(
        responses: &[&str],
        make_listener: impl FnOnce(Arc<Mutex<Option<String>>>) -> FakeListener,
    ) -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let endpoint = FakeEndpoint::respond_with(responses);
        let opened_url = Arc::new(Mutex::new(None));
        let manager = TokenManager::new(
            Arc::clone(&store) as Arc<dyn SecretStore>,
            Arc::clone(&endpoint) as Arc<dyn TokenEndpoint>,
            Arc::new(make_listener(Arc::clone(&opened_url))),
            Arc::new(FakeBrowser {
                opened_url: Arc::clone(&opened_url),
            }),
            Arc::new(SystemClock),
        );
        Fixture {
            manager,
            store,
            endpoint,
            opened_url,
        }
    }

    fn fixture(responses: &[&str]) -> Fixture {
        fixture_with(responses, |opened_url| FakeListener {
            opened_url,
            error: None,
            override_state: None,
            cancel_instead: false,
        })
    }

    const TOKEN_OK: &str =
        r#"{"access_token": "at-1", "token_type": "Bearer", "expires_in": 3600}"#;
    const TOKEN_REFRESHED: &str = r#"{"access_token": "at-2", "expires_in": 3600}"#;

    fn config() -> OAuth2Config {
        OAuth2Config::client_credentials("https://auth.example.com/token", "client-1")
            .with_client_secret("s3cret")
    }

    fn auth_code_config() -> OAuth2Config {
        let mut config = config();
        config.flow = OAuth2Flow::AuthorizationCode;
        config.authorize_url = Some("https://auth.example.com/authorize".to_string());
        config
    }

    async fn seed_token(fx: &Fixture, config: &OAuth2Config, token: &OAuth2TokenData) {
        let key = token_store_key("col", Some("dev"), config);
        fx.store
            .set(&key, &serde_json::to_string(token).unwrap())
            .await
            .unwrap();
    }

    fn expired_token(refresh: Option<&str>) -> OAuth2TokenData {
        OAuth2TokenData {
            access_token: "stale".to_string(),
            token_type: None,
            expires_in: Some(60),
            refresh_token: refresh.map(ToString::to_string),
            scope: None,
            created_at: (Utc::now() - chrono::Duration::seconds(120)).timestamp_millis(),
        }
    }

    #[tokio::test]
    async fn test_fetches_and_caches_client_credentials_token() {
        let fx = fixture(&[TOKEN_OK]);
        let token = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.access_token, "at-1");

        let requests = fx.endpoint.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://auth.example.com/token");
        assert!(requests[0]
            .params
            .contains(&("grant_type".to_string(), "client_credentials".to_string())));
        assert_eq!(
            requests[0].basic_auth,
            Some(("client-1".to_string(), "s3cret".to_string()))
        );

        // second call is served from the store, no further network call
        let again = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.access_token, "at-1");
        assert_eq!(fx.endpoint.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_body_placement_puts_credentials_in_form() {
        let fx = fixture(&[TOKEN_OK]);
        let mut config = config();
        config.credentials_placement = CredentialsPlacement::Body;

        fx.manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap();

        let requests = fx.endpoint.requests();
        assert_eq!(requests[0].basic_auth, None);
        assert!(requests[0]
            .params
            .contains(&("client_id".to_string(), "client-1".to_string())));
        assert!(requests[0]
            .params
            .contains(&("client_secret".to_string(), "s3cret".to_string())));
    }

    #[tokio::test]
    async fn test_missing_client_id_fails_before_network() {
        let fx = fixture(&[TOKEN_OK]);
        let mut config = config();
        config.client_id = String::new();

        let err = fx
            .manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingField("client_id"));
        assert!(fx.endpoint.requests().is_empty());
    }

    #[tokio::test]
    async fn test_password_flow_sends_owner_credentials() {
        let fx = fixture(&[TOKEN_OK]);
        let mut config = config();
        config.flow = OAuth2Flow::Password;
        config.username = Some("alice".to_string());
        config.password = Some("pw".to_string());

        fx.manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap();

        let params = &fx.endpoint.requests()[0].params;
        assert!(params.contains(&("grant_type".to_string(), "password".to_string())));
        assert!(params.contains(&("username".to_string(), "alice".to_string())));
        assert!(params.contains(&("password".to_string(), "pw".to_string())));
    }

    #[tokio::test]
    async fn test_password_flow_requires_username() {
        let fx = fixture(&[TOKEN_OK]);
        let mut config = config();
        config.flow = OAuth2Flow::Password;
        config.password = Some("pw".to_string());

        let err = fx
            .manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingField("username"));
    }

    #[tokio::test]
    async fn test_unsupported_flow_names_the_flow() {
        let fx = fixture(&[]);
        let mut config = config();
        config.flow = OAuth2Flow::Other("device_code".to_string());

        let err = fx
            .manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::UnsupportedFlow("device_code".to_string()));
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_with_refresh_grant() {
        let fx = fixture(&[TOKEN_REFRESHED]);
        seed_token(&fx, &config(), &expired_token(Some("rt-1"))).await;

        let token = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(token.access_token, "at-2");
        let params = &fx.endpoint.requests()[0].params;
        assert!(params.contains(&("grant_type".to_string(), "refresh_token".to_string())));
        assert!(params.contains(&("refresh_token".to_string(), "rt-1".to_string())));
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_fetch() {
        let fx = fixture(&[
            r#"{"error": "invalid_grant", "error_description": "refresh token revoked"}"#,
            TOKEN_OK,
        ]);
        seed_token(&fx, &config(), &expired_token(Some("rt-dead"))).await;

        let token = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(token.access_token, "at-1");
        assert_eq!(fx.endpoint.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_auto_fetch_disabled_returns_none() {
        let fx = fixture(&[]);
        let mut config = config();
        config.auto_fetch_token = false;

        let token = fx
            .manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap();
        assert_eq!(token, None);
        assert!(fx.endpoint.requests().is_empty());
    }

    #[tokio::test]
    async fn test_expired_without_refresh_is_deleted_then_none_when_fetch_disabled() {
        let fx = fixture(&[]);
        let mut config = config();
        config.auto_fetch_token = false;
        seed_token(&fx, &config, &expired_token(None)).await;

        let token = fx
            .manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap();
        assert_eq!(token, None);

        let key = token_store_key("col", Some("dev"), &config);
        assert_eq!(fx.store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_body_surfaces_code_and_description() {
        let fx = fixture(&[r#"{"error": "invalid_client", "error_description": "bad secret"}"#]);
        let err = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::TokenEndpoint {
                error: "invalid_client".to_string(),
                description: Some("bad secret".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_body_without_access_token_is_invalid() {
        let fx = fixture(&[r#"{"token_type": "Bearer"}"#]);
        let err = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidTokenResponse(_)));
    }

    #[tokio::test]
    async fn test_string_expires_in_is_accepted() {
        let fx = fixture(&[r#"{"access_token": "at", "expires_in": "1800"}"#]);
        let token = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.expires_in, Some(1800));
    }

    #[tokio::test]
    async fn test_authorization_code_flow_exchanges_code_with_pkce() {
        let fx = fixture(&[TOKEN_OK]);
        let token = fx
            .manager
            .get_token(&auth_code_config(), "col", Some("dev"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.access_token, "at-1");

        let opened = fx.opened_url.lock().unwrap().clone().unwrap();
        let url = Url::parse(&opened).unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], "http://127.0.0.1:49152/callback");
        assert_eq!(query["code_challenge_method"], "S256");
        assert!(query.contains_key("state"));

        let params = &fx.endpoint.requests()[0].params;
        assert!(params.contains(&("grant_type".to_string(), "authorization_code".to_string())));
        assert!(params.contains(&("code".to_string(), "auth-code-1".to_string())));
        assert!(params.iter().any(|(k, _)| k == "code_verifier"));
    }

    #[tokio::test]
    async fn test_pkce_disabled_omits_challenge_and_verifier() {
        let fx = fixture(&[TOKEN_OK]);
        let mut config = auth_code_config();
        config.use_pkce = false;

        fx.manager
            .get_token(&config, "col", Some("dev"))
            .await
            .unwrap();

        let opened = fx.opened_url.lock().unwrap().clone().unwrap();
        assert!(!opened.contains("code_challenge"));
        let params = &fx.endpoint.requests()[0].params;
        assert!(!params.iter().any(|(k, _)| k == "code_verifier"));
    }

    #[tokio::test]
    async fn test_mismatched_state_is_rejected() {
        let fx = fixture_with(&[TOKEN_OK], |opened_url| FakeListener {
            opened_url,
            error: None,
            override_state: Some("attacker-state".to_string()),
            cancel_instead: false,
        });

        let err = fx
            .manager
            .get_token(&auth_code_config(), "col", Some("dev"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::StateMismatch);
        assert!(fx.endpoint.requests().is_empty());
    }

    #[tokio::test]
    async fn test_denied_authorization_carries_description() {
        let fx = fixture_with(&[], |opened_url| FakeListener {
            opened_url,
            error: Some(("access_denied".to_string(), Some("user said no".to_string()))),
            override_state: None,
            cancel_instead: false,
        });

        let err = fx
            .manager
            .get_token(&auth_code_config(), "col", Some("dev"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::AuthorizationDenied("access_denied: user said no".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancellation_aborts_the_wait() {
        let fx = fixture_with(&[], |opened_url| FakeListener {
            opened_url,
            error: None,
            override_state: None,
            cancel_instead: true,
        });

        let (token, receiver) = crate::ports::CancellationToken::new();
        token.cancel();
        let err = fx
            .manager
            .get_token_with_cancellation(&auth_code_config(), "col", Some("dev"), receiver)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Cancelled);
    }

    #[tokio::test]
    async fn test_token_status_is_a_pure_read() {
        let fx = fixture(&[TOKEN_OK]);
        let status = fx
            .manager
            .get_token_status(&config(), "col", Some("dev"))
            .await
            .unwrap();
        assert_eq!(status, TokenStatus::none());
        assert!(fx.endpoint.requests().is_empty());

        fx.manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap();
        let status = fx
            .manager
            .get_token_status(&config(), "col", Some("dev"))
            .await
            .unwrap();
        assert!(status.has_token);
        assert_eq!(status.is_expired, Some(false));
    }

    #[tokio::test]
    async fn test_clear_token_removes_one_entry() {
        let fx = fixture(&[TOKEN_OK]);
        fx.manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap();
        fx.manager
            .clear_token(&config(), "col", Some("dev"))
            .await
            .unwrap();

        let status = fx
            .manager
            .get_token_status(&config(), "col", Some("dev"))
            .await
            .unwrap();
        assert!(!status.has_token);
    }

    #[tokio::test]
    async fn test_clear_all_tokens_uses_the_index() {
        let fx = fixture(&[TOKEN_OK, TOKEN_OK]);
        let mut other = config();
        other.credentials_id = Some("admin".to_string());

        fx.manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap();
        fx.manager
            .get_token(&other, "col", Some("dev"))
            .await
            .unwrap();

        fx.manager.clear_all_tokens("col").await.unwrap();
        assert!(fx.store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_stored_token_is_treated_as_absent() {
        let fx = fixture(&[TOKEN_OK]);
        let key = token_store_key("col", Some("dev"), &config());
        fx.store.set(&key, "not json").await.unwrap();

        let token = fx
            .manager
            .get_token(&config(), "col", Some("dev"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.access_token, "at-1");
    }
}
