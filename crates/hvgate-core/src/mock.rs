//! Mock transport for testing.
//!
//! [`MockTransport`] implements [`Transport`] without touching the network.
//! Every request is recorded; replies come from a script queue or, when the
//! queue is empty, from an optional handler.
//!
//! # Features
//!
//! - **Scripted replies**: queue replies, statuses and errors in order
//! - **Handler**: compute a reply from the request (for concurrent tests)
//! - **Latency simulation**: delay every reply
//! - **Reply builders**: [`session_reply`], [`people_reply`] and friends
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use hvgate_core::mock::{MockTransport, people_reply, session_reply};
//! use hvgate_core::{AppInstance, Client};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = Arc::new(MockTransport::new());
//!     mock.push_ok(session_reply("AUTH1", b"SS1"));
//!     mock.push_ok(people_reply(&[("P1", "R1", "Alice")]));
//!
//!     let app = AppInstance::new("APP1", b"SEC1".to_vec(), "TOK1");
//!     let client = Client::open(mock.clone(), "host.example", app).await.unwrap();
//!     assert_eq!(client.persons().await.len(), 1);
//!     assert_eq!(mock.request_count(), 2);
//! }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::crypto::b64_encode;
use crate::envelope;
use crate::error::{Error, Result};
use crate::transport::{HttpResponse, Transport};
use crate::xml::{Element, escape};

type Handler = Arc<dyn Fn(&RecordedRequest) -> Result<HttpResponse> + Send + Sync>;

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Host the request was sent to.
    pub host: String,
    /// Path the request was sent to.
    pub path: String,
    /// Request body.
    pub body: String,
}

impl RecordedRequest {
    /// Text of the first element with the given local name.
    pub fn text(&self, tag: &str) -> Option<String> {
        Element::parse(&self.body)
            .ok()
            .and_then(|root| root.find_text(tag).map(str::to_string))
    }

    /// Value of `<method>`.
    pub fn method(&self) -> Option<String> {
        self.text("method")
    }

    /// Exact bytes of the first element named `tag`, tags included.
    pub fn element_bytes(&self, tag: &str) -> Option<&str> {
        envelope::element_bytes(&self.body, tag)
    }
}

/// A scripted, recording [`Transport`].
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse>>>,
    handler: Mutex<Option<Handler>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("scripted", &lock(&self.script).len())
            .field("requests", &self.request_count())
            .field("latency_ms", &self.latency_ms.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockTransport {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            handler: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Queue a 200 reply.
    pub fn push_ok(&self, body: impl Into<String>) {
        self.push_response(HttpResponse::ok(body.into()));
    }

    /// Queue a reply with an arbitrary HTTP status.
    pub fn push_status(&self, status: u16, body: impl Into<String>) {
        self.push_response(HttpResponse {
            status,
            body: Bytes::from(body.into()),
        });
    }

    /// Queue a reply.
    pub fn push_response(&self, response: HttpResponse) {
        lock(&self.script).push_back(Ok(response));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: Error) {
        lock(&self.script).push_back(Err(error));
    }

    /// Number of queued replies not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// Answer requests with `handler` once the script is exhausted.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&RecordedRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        *lock(&self.handler) = Some(Arc::new(handler));
    }

    /// Delay every reply.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// `<method>` of every request, in order.
    pub fn methods(&self) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .map(|r| r.method().unwrap_or_default())
            .collect()
    }

    /// Number of requests for the given method.
    pub fn count_method(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, host: &str, path: &str, body: Bytes) -> Result<HttpResponse> {
        let request = RecordedRequest {
            host: host.to_string(),
            path: path.to_string(),
            body: String::from_utf8_lossy(&body).into_owned(),
        };
        lock(&self.requests).push(request.clone());

        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if let Some(scripted) = lock(&self.script).pop_front() {
            return scripted;
        }
        let handler = lock(&self.handler).clone();
        match handler {
            Some(handler) => handler(&request),
            None => Err(Error::transport("mock transport has no reply scripted")),
        }
    }
}

/// A reply with the given code and `<info>` content.
pub fn reply(code: u32, info: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><response><status><code>{}</code></status><wc:info xmlns:wc="urn:com.microsoft.wc.methods.response">{}</wc:info></response>"#,
        code, info
    )
}

/// A successful reply with the given `<info>` content.
pub fn ok_reply(info: &str) -> String {
    reply(0, info)
}

/// A reply with a nonzero code and no content.
pub fn error_reply(code: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><response><status><code>{}</code><error><message>mock error {}</message></error></status></response>"#,
        code, code
    )
}

/// A NewApplicationCreationInfo reply.
pub fn app_creation_reply(app_id: &str, shared_secret: &[u8], app_token: &str) -> String {
    ok_reply(&format!(
        "<app-id>{}</app-id><shared-secret>{}</shared-secret><app-token>{}</app-token>",
        escape(app_id),
        b64_encode(shared_secret),
        escape(app_token)
    ))
}

/// A CreateAuthenticatedSessionToken reply.
pub fn session_reply(token: &str, shared_secret: &[u8]) -> String {
    ok_reply(&format!(
        "<token>{}</token><shared-secret>{}</shared-secret>",
        escape(token),
        b64_encode(shared_secret)
    ))
}

/// A GetAuthorizedPeople reply listing `(person_id, record_id, name)` entries.
pub fn people_reply(persons: &[(&str, &str, &str)]) -> String {
    let mut info = String::from("<response-results>");
    for (person_id, record_id, name) in persons {
        info.push_str(&format!(
            r#"<person-info><person-id>{}</person-id><record id="{}">{}</record></person-info>"#,
            escape(person_id),
            escape(record_id),
            escape(name)
        ));
    }
    info.push_str("<more-results>false</more-results></response-results>");
    ok_reply(&info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Reply;

    #[tokio::test]
    async fn test_script_then_handler_then_error() {
        let mock = MockTransport::new();
        mock.push_ok("<response><code>0</code></response>");
        mock.set_handler(|req| {
            assert_eq!(req.path, "/p");
            Ok(HttpResponse::ok("<response><code>1</code></response>"))
        });

        let first = mock.post("h", "/p", Bytes::from("a")).await.unwrap();
        assert_eq!(first.body, Bytes::from("<response><code>0</code></response>"));
        let second = mock.post("h", "/p", Bytes::from("b")).await.unwrap();
        assert_eq!(second.body, Bytes::from("<response><code>1</code></response>"));
        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.last_request().unwrap().body, "b");
    }

    #[tokio::test]
    async fn test_empty_script_is_transport_error() {
        let mock = MockTransport::new();
        let err = mock.post("h", "/p", Bytes::new()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_reply_builders_decode() {
        let app = Reply::parse(app_creation_reply("APP1", b"SEC1", "TOK1").as_bytes())
            .unwrap()
            .app_instance()
            .unwrap();
        assert_eq!(app.shared_secret, b"SEC1");

        let session = Reply::parse(session_reply("AUTH1", b"SS1").as_bytes())
            .unwrap()
            .session()
            .unwrap();
        assert_eq!(session.auth_token, "AUTH1");

        let persons = Reply::parse(people_reply(&[("P1", "R1", "A & B")]).as_bytes())
            .unwrap()
            .persons()
            .unwrap();
        assert_eq!(persons[0].display_name, "A & B");

        assert_eq!(Reply::parse(error_reply(65).as_bytes()).unwrap().code(), 65);
    }
}
