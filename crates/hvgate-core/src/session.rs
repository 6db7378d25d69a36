//! Credentials: the provisioned application instance and live sessions.

use std::fmt;

use time::OffsetDateTime;

/// Per-gateway identity issued once by the service.
///
/// Created by [`crate::provision`], persisted by a
/// [`crate::CredentialStore`] and reloaded on every start. Never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct AppInstance {
    /// Application instance id.
    pub app_id: String,
    /// Raw shared secret (base64-decoded).
    pub shared_secret: Vec<u8>,
    /// Token the service issued alongside the instance.
    pub creation_token: String,
}

impl AppInstance {
    /// Create an application instance.
    pub fn new(
        app_id: impl Into<String>,
        shared_secret: impl Into<Vec<u8>>,
        creation_token: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            shared_secret: shared_secret.into(),
            creation_token: creation_token.into(),
        }
    }
}

impl fmt::Debug for AppInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppInstance")
            .field("app_id", &self.app_id)
            .field("shared_secret", &Redacted(self.shared_secret.len()))
            .field("creation_token", &Redacted(self.creation_token.len()))
            .finish()
    }
}

/// Short-lived authenticated context.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token sent in `<auth-token>`.
    pub auth_token: String,
    /// HMAC key for request headers.
    pub session_secret: Vec<u8>,
    /// When the session was granted.
    pub created_at: OffsetDateTime,
}

impl Session {
    /// Create a session stamped with the current time.
    pub fn new(auth_token: impl Into<String>, session_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            auth_token: auth_token.into(),
            session_secret: session_secret.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("auth_token", &Redacted(self.auth_token.len()))
            .field("session_secret", &Redacted(self.session_secret.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

struct Redacted(usize);

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted {} bytes>", self.0)
    }
}
