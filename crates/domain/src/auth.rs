//! OAuth2 configuration and token types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Safety margin subtracted from a token's lifetime: a token is treated as
/// expired this many seconds before its actual expiry.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 30;

/// The OAuth2 grant flow to use when fetching a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuth2Flow {
    /// `grant_type=client_credentials`.
    ClientCredentials,
    /// `grant_type=password`.
    #[serde(rename = "resource_owner_password_credentials")]
    Password,
    /// `grant_type=authorization_code` via browser + loopback callback.
    AuthorizationCode,
    /// A flow name this version does not implement. Parses so the rest of
    /// the configuration stays usable; token acquisition rejects it.
    #[serde(untagged)]
    Other(String),
}

impl OAuth2Flow {
    /// Returns the configuration-file name of this flow.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::Password => "resource_owner_password_credentials",
            Self::AuthorizationCode => "authorization_code",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for OAuth2Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where client credentials are placed in the token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsPlacement {
    /// `Authorization: Basic base64(client_id:client_secret)` header.
    #[default]
    BasicHeader,
    /// `client_id` / `client_secret` form fields in the request body.
    Body,
}

/// OAuth2 authentication configuration, as attached to a request or to
/// collection/folder defaults. Credential fields may contain `{{var}}` and
/// `$secret` references; callers interpolate before handing the config to
/// the token manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Config {
    /// Grant flow.
    pub flow: OAuth2Flow,

    /// Token endpoint URL.
    pub access_token_url: String,

    /// Authorization endpoint URL (authorization code flow only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,

    /// Client identifier. Required by every flow.
    #[serde(default)]
    pub client_id: String,

    /// Client secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Resource owner username (password flow).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Resource owner password (password flow).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Space-separated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Distinguishes multiple credential sets against the same token URL in
    /// the token cache. Defaults to `"default"` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_id: Option<String>,

    /// Where client credentials go in the token request.
    #[serde(default)]
    pub credentials_placement: CredentialsPlacement,

    /// Whether `get_token` may fetch a new token when none is cached.
    #[serde(default = "default_true")]
    pub auto_fetch_token: bool,

    /// Whether an expired token with a refresh token is refreshed
    /// automatically.
    #[serde(default = "default_true")]
    pub auto_refresh_token: bool,

    /// Whether the authorization code flow uses PKCE (S256).
    #[serde(default = "default_true")]
    pub use_pkce: bool,
}

const fn default_true() -> bool {
    true
}

impl OAuth2Config {
    /// Creates a client credentials configuration.
    #[must_use]
    pub fn client_credentials(
        access_token_url: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            flow: OAuth2Flow::ClientCredentials,
            access_token_url: access_token_url.into(),
            authorize_url: None,
            client_id: client_id.into(),
            client_secret: None,
            username: None,
            password: None,
            scope: None,
            credentials_id: None,
            credentials_placement: CredentialsPlacement::default(),
            auto_fetch_token: true,
            auto_refresh_token: true,
            use_pkce: true,
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Returns the effective credentials id for cache keying.
    #[must_use]
    pub fn effective_credentials_id(&self) -> &str {
        self.credentials_id.as_deref().unwrap_or("default")
    }
}

/// A fetched OAuth2 token with the metadata needed for expiry tracking.
///
/// Records are never mutated in place; a refresh or re-fetch replaces the
/// stored record wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2TokenData {
    /// The access token string.
    pub access_token: String,

    /// Token type, usually "Bearer".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Lifetime in seconds. Absent means the token never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Refresh token, if the endpoint issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// When the token was received, epoch milliseconds.
    pub created_at: i64,
}

impl OAuth2TokenData {
    /// When this token expires, if it expires at all.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let expires_in = self.expires_in?;
        let created = Utc.timestamp_millis_opt(self.created_at).single()?;
        Some(created + chrono::Duration::seconds(expires_in.cast_signed()))
    }

    /// Whether the token is past `created_at + expires_in` minus the 30
    /// second safety margin. Tokens without `expires_in` never expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| {
            now + chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) >= expires_at
        })
    }

    /// Whether this token carries a refresh token.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Builds a status snapshot for display purposes.
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> TokenStatus {
        let expires_at = self.expires_at();
        TokenStatus {
            has_token: true,
            expires_at,
            is_expired: Some(self.is_expired(now)),
            time_remaining: expires_at.map(|exp| (exp - now).num_seconds()),
        }
    }
}

/// Read-only snapshot of a stored token's state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenStatus {
    /// Whether a token is stored for the key at all.
    pub has_token: bool,
    /// When the stored token expires, if known.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the stored token is expired (margin included).
    pub is_expired: Option<bool>,
    /// Seconds until expiry (negative once past).
    pub time_remaining: Option<i64>,
}

impl TokenStatus {
    /// Status for a key with no stored token.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            has_token: false,
            expires_at: None,
            is_expired: None,
            time_remaining: None,
        }
    }
}

/// Errors from the OAuth2 token lifecycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// A required configuration field is absent.
    #[error("missing required OAuth2 field: {0}")]
    MissingField(&'static str),

    /// The configured flow is not supported.
    #[error("unsupported OAuth2 flow: {0}")]
    UnsupportedFlow(String),

    /// The configuration is malformed in a way beyond a missing field.
    #[error("invalid OAuth2 configuration: {0}")]
    InvalidConfiguration(String),

    /// The token endpoint returned an OAuth2 error body.
    #[error("token endpoint error: {error}: {}", .description.as_deref().unwrap_or("no description"))]
    TokenEndpoint {
        /// OAuth2 error code (e.g. `invalid_client`).
        error: String,
        /// Human-readable description, if the endpoint sent one.
        description: Option<String>,
    },

    /// The token endpoint response could not be understood.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// A network-level failure talking to the token endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// The authorization server denied the authorization request.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The callback's `state` did not match the one sent.
    #[error("authorization state mismatch")]
    StateMismatch,

    /// The authorization callback did not arrive in time.
    #[error("authorization timed out after {0} seconds")]
    Timeout(u64),

    /// The user cancelled the authorization.
    #[error("authorization cancelled")]
    Cancelled,

    /// The loopback callback listener failed.
    #[error("callback listener error: {0}")]
    CallbackServer(String),

    /// The system browser could not be opened.
    #[error("failed to open browser: {0}")]
    Browser(String),

    /// The token store failed.
    #[error("token store error: {0}")]
    Storage(String),
}
