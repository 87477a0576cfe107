//! OAuth2 transport ports
//!
//! These ports isolate the token manager from the network, the local
//! loopback callback server and the system browser so the full
//! authorization-code dance is testable with in-process fakes.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use missio_domain::AuthError;

/// Query parameters delivered to the loopback redirect endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code on success.
    pub code: Option<String>,
    /// Opaque state echoed back by the authorization server.
    pub state: Option<String>,
    /// Error code on denial (e.g. `access_denied`).
    pub error: Option<String>,
    /// Human-readable error detail.
    pub error_description: Option<String>,
}

/// Port for posting form-encoded requests to a token endpoint.
///
/// Implementations return the raw response body regardless of HTTP status;
/// the token manager interprets the JSON payload itself so OAuth2 error
/// bodies (which arrive with 4xx statuses) surface as structured errors.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Posts `params` form-encoded to `url` and returns the response body.
    ///
    /// `basic_auth` carries client credentials for the HTTP Basic scheme
    /// when the credentials placement asks for it.
    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
    ) -> Result<String, AuthError>;
}

/// A bound loopback server waiting for a single authorization redirect.
#[async_trait]
pub trait PendingAuthorization: Send {
    /// Redirect URI the authorization request must carry, e.g.
    /// `http://127.0.0.1:49152/callback`.
    fn redirect_uri(&self) -> String;

    /// Waits for the redirect to arrive, consuming the server.
    ///
    /// Returns [`AuthError::Timeout`] when `timeout` elapses first and
    /// [`AuthError::Cancelled`] when `cancel` fires first.
    async fn wait_for_callback(
        self: Box<Self>,
        timeout: Duration,
        cancel: CancellationReceiver,
    ) -> Result<CallbackParams, AuthError>;
}

/// Port for binding the loopback callback server.
#[async_trait]
pub trait AuthorizationListener: Send + Sync {
    /// Binds a listener on an ephemeral loopback port.
    async fn bind(&self) -> Result<Box<dyn PendingAuthorization>, AuthError>;
}

/// Port for opening the system browser at an authorization URL.
pub trait BrowserLauncher: Send + Sync {
    /// Opens `url` in the user's browser.
    fn open(&self, url: &str) -> Result<(), AuthError>;
}

/// Handle for cancelling an in-flight interactive authorization.
#[derive(Debug)]
pub struct CancellationToken {
    sender: watch::Sender<bool>,
}

/// Receiving half of a [`CancellationToken`].
#[derive(Debug, Clone)]
pub struct CancellationReceiver {
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Creates a token and its receiving half.
    #[must_use]
    pub fn new() -> (Self, CancellationReceiver) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, CancellationReceiver { receiver })
    }

    /// Signals cancellation to all receivers.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl CancellationReceiver {
    /// A receiver that never fires, for non-interactive flows.
    #[must_use]
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Resolves once cancellation is signalled.
    ///
    /// A dropped [`CancellationToken`] never resolves; the surrounding
    /// `select!` keeps waiting on the real event.
    pub async fn cancelled(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
