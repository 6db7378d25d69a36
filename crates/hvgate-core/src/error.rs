//! Error types for hvgate-core.
//!
//! Every failure the session client can surface belongs to exactly one
//! [`ErrorKind`]. Callers branch on the kind, not on the message.
//!
//! # Recovery
//!
//! | Kind | Strategy |
//! |------|----------|
//! | [`ErrorKind::Transport`] | Retry with backoff (see [`crate::with_retry`]) |
//! | [`ErrorKind::Auth`] | Do not retry; re-provision or fix credentials |
//! | [`ErrorKind::Service`] | Do not retry; the service rejected the request |
//! | [`ErrorKind::Protocol`] | Do not retry; the reply did not match the protocol |
//! | [`ErrorKind::Usage`] | Fix the caller |
//! | [`ErrorKind::Storage`] | Fix the credential file and restart |
//!
//! The client recovers on its own only from the session-expired code, and
//! only once per request.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the session client and its collaborators.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// Connection, TLS or I/O failure, or an HTTP status other than 200.
    #[error("Transport error{}: {message}", format_status(.status))]
    Transport {
        /// HTTP status code, when the server answered.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// Session creation was rejected or a refresh did not help.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service refused to create an application instance.
    #[error("Provisioning rejected by service (code {code})")]
    Provisioning {
        /// In-band status code from the reply.
        code: u32,
    },

    /// The service answered with a nonzero status code.
    #[error("Service returned code {code}")]
    Service {
        /// In-band status code from the reply.
        code: u32,
        /// Raw reply body.
        body: String,
    },

    /// The reply did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The caller used the client incorrectly.
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// The credential file could not be read, parsed or written.
    #[error("Credential store error at {}: {message}", .path.display())]
    Credentials {
        /// Path of the credential file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// Incorrect use of the client or bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum UsageError {
    /// A record operation ran before a person was selected.
    #[error("no person selected")]
    NoPersonSelected,

    /// No authorized person has the given display name.
    #[error("no authorized person named '{0}'")]
    UnknownPerson(String),

    /// The person index is past the end of the list.
    #[error("person index {index} out of range ({len} authorized)")]
    PersonIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of authorized persons.
        len: usize,
    },

    /// A sample arrived for a channel with no record mapping.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network or HTTP-level failure.
    Transport,
    /// Credential or session rejection.
    Auth,
    /// In-band service rejection.
    Service,
    /// Malformed or unexpected reply.
    Protocol,
    /// Caller error.
    Usage,
    /// Credential persistence failure.
    Storage,
}

impl Error {
    /// Create a transport error without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Create a transport error for an unexpected HTTP status.
    pub fn http_status(status: u16) -> Self {
        Self::Transport {
            status: Some(status),
            message: format!("unexpected HTTP status {}", status),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create an error for a reply that lacks a required element.
    pub fn missing_element(method: &str, element: &str) -> Self {
        Self::Protocol(format!("{} reply is missing <{}>", method, element))
    }

    /// Create a credential store error.
    pub fn credentials(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Credentials {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Auth(_) | Error::Provisioning { .. } => ErrorKind::Auth,
            Error::Service { .. } => ErrorKind::Service,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Usage(_) => ErrorKind::Usage,
            Error::Credentials { .. } => ErrorKind::Storage,
        }
    }

    /// Whether retrying after a backoff may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

/// Result type alias using hvgate-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
