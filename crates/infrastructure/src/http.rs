//! Token endpoint adapter using reqwest

use std::time::Duration;

use async_trait::async_trait;

use missio_application::ports::TokenEndpoint;
use missio_domain::AuthError;

/// Timeout for token endpoint requests.
const NETWORK_TIMEOUT: Duration = Duration::from_secs(15);

/// [`TokenEndpoint`] backed by `reqwest`.
///
/// Requests are form-encoded POSTs with `Accept: application/json`,
/// redirects disabled (a token endpoint that redirects is misconfigured or
/// hostile) and a 15 second timeout. The body is returned for any HTTP
/// status; the caller interprets OAuth2 error payloads.
pub struct ReqwestTokenEndpoint {
    client: reqwest::Client,
}

impl ReqwestTokenEndpoint {
    /// Creates the adapter with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(NETWORK_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| AuthError::Network(err.to_string()))?;
        Ok(Self { client })
    }

    /// Creates the adapter over an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenEndpoint for ReqwestTokenEndpoint {
    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
    ) -> Result<String, AuthError> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(params);

        if let Some((user, password)) = basic_auth {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                AuthError::Timeout(NETWORK_TIMEOUT.as_secs())
            } else {
                AuthError::Network(err.to_string())
            }
        })?;

        response
            .text()
            .await
            .map_err(|err| AuthError::Network(err.to_string()))
    }
}
