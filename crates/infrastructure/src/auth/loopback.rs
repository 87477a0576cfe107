//! Loopback callback listener for the authorization code flow

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use missio_application::ports::{
    AuthorizationListener, CallbackParams, CancellationReceiver, PendingAuthorization,
};
use missio_domain::AuthError;

/// HTML answered to the browser once the redirect arrives, whatever the
/// outcome; the real result travels back through the flow, not the page.
const CONFIRMATION_PAGE: &str = "<!DOCTYPE html><html><head><title>Missio</title></head>\
<body><p>Authorization received. You can close this window and return to Missio.</p>\
</body></html>";

/// [`AuthorizationListener`] binding a real TCP socket on an OS-assigned
/// loopback port.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackListener;

#[async_trait]
impl AuthorizationListener for LoopbackListener {
    async fn bind(&self) -> Result<Box<dyn PendingAuthorization>, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|err| AuthError::CallbackServer(err.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|err| AuthError::CallbackServer(err.to_string()))?
            .port();
        Ok(Box::new(BoundCallback { listener, port }))
    }
}

/// A bound socket waiting for its single redirect. Dropping it (on any exit
/// path, including timeout and cancellation) closes the socket.
struct BoundCallback {
    listener: TcpListener,
    port: u16,
}

#[async_trait]
impl PendingAuthorization for BoundCallback {
    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    async fn wait_for_callback(
        self: Box<Self>,
        timeout: Duration,
        mut cancel: CancellationReceiver,
    ) -> Result<CallbackParams, AuthError> {
        let accept = async {
            loop {
                let (stream, _) = self
                    .listener
                    .accept()
                    .await
                    .map_err(|err| AuthError::CallbackServer(err.to_string()))?;
                // Browsers also request /favicon.ico; keep accepting until
                // the callback path shows up.
                if let Some(params) = answer_request(stream).await? {
                    return Ok(params);
                }
            }
        };

        tokio::select! {
            result = accept => result,
            () = tokio::time::sleep(timeout) => Err(AuthError::Timeout(timeout.as_secs())),
            () = cancel.cancelled() => Err(AuthError::Cancelled),
        }
    }
}

/// Reads the request line, answers with the confirmation page and returns
/// the callback parameters when the request hit `/callback`.
async fn answer_request(mut stream: TcpStream) -> Result<Option<CallbackParams>, AuthError> {
    let mut reader = BufReader::new(&mut stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .await
        .map_err(|err| AuthError::CallbackServer(err.to_string()))?;

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let params = parse_callback(target);

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{CONFIRMATION_PAGE}",
        CONFIRMATION_PAGE.len()
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|err| AuthError::CallbackServer(err.to_string()))?;
    let _ = stream.shutdown().await;

    Ok(params)
}

fn parse_callback(target: &str) -> Option<CallbackParams> {
    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;
    if url.path() != "/callback" {
        return None;
    }

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        let value = value.into_owned();
        match key.as_ref() {
            "code" => params.code = Some(value),
            "state" => params.state = Some(value),
            "error" => params.error = Some(value),
            "error_description" => params.error_description = Some(value),
            _ => {}
        }
    }
    Some(params)
}
