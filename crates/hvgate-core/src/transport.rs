//! HTTPS transport.
//!
//! The [`Transport`] trait is the seam between request signing and the
//! network: the client hands it a finished body and gets back the status
//! line and raw reply bytes. [`HttpsTransport`] is the production
//! implementation; [`crate::mock::MockTransport`] is used in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// `Content-Type` sent with every request.
pub const CONTENT_TYPE: &str = "text/xml";

/// Status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw reply body.
    pub body: Bytes,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Sends request bodies to the service.
///
/// Implementations map connection failures and timeouts to
/// [`Error::Transport`]. Non-200 statuses are returned, not mapped.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `path` on `host`.
    async fn post(&self, host: &str, path: &str, body: Bytes) -> Result<HttpResponse>;
}

/// HTTPS on port 443 via reqwest.
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    client: Client,
}

impl HttpsTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .https_only(true)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a transport with a custom reqwest Client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn post(&self, host: &str, path: &str, body: Bytes) -> Result<HttpResponse> {
        let url = format!("https://{}{}", host, path);
        debug!("POST {} ({} bytes)", url, body.len());

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&url, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&url, e))?;
        debug!("{} answered HTTP {} ({} bytes)", url, status, body.len());

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> Error {
    let status = err.status().map(|s| s.as_u16());
    let message = if err.is_timeout() {
        format!("request to {} timed out", url)
    } else if err.is_connect() {
        format!("could not connect to {}: {}", url, err)
    } else {
        format!("request to {} failed: {}", url, err)
    };
    Error::Transport { status, message }
}
