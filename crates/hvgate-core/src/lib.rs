//! Signed session client for a personal health record service.
//!
//! This crate talks to the service's XML-over-HTTPS platform endpoint on
//! behalf of one gateway. Every request after provisioning is bound to the
//! current session by a digest of its `<info>` and an HMAC of its
//! `<header>`.
//!
//! # Features
//!
//! - **Provisioning**: obtain and persist a per-gateway application instance
//! - **Session handshake**: session token plus the list of authorized persons
//! - **Record operations**: `GetThings` and `PutThings` for the selected person
//! - **Automatic refresh**: one transparent retry after a session expires
//! - **Retry helper**: backoff for transport failures
//! - **Testing**: a scripted [`mock::MockTransport`]
//!
//! # Protocol Constants
//!
//! | Field | Value |
//! |-------|-------|
//! | Path | `/platform/wildcat.ashx` |
//! | `language` / `country` | `en` / `US` |
//! | `msg-ttl` | `36000` |
//! | `version` | `0.0.0.1` |
//! | Header MAC | `HMACSHA1` |
//! | Info digest | `SHA1` |
//! | Success / session expired | `0` / `65` |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hvgate_core::{FileCredentialStore, HttpsTransport, ensure_client};
//! use hvgate_types::record_types;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FileCredentialStore::new("/var/lib/hvgate/app-instance");
//!     let transport = Arc::new(HttpsTransport::new()?);
//!     let client = ensure_client(
//!         &store,
//!         transport,
//!         "platform.example.com",
//!         "00000000-0000-0000-0000-000000000000",
//!     )
//!     .await?;
//!
//!     for person in client.persons().await {
//!         println!("{}", person);
//!     }
//!     client.select_person(0usize).await?;
//!     let body = client.get_things(record_types::WEIGHT).await?;
//!     println!("{}", body);
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod client;
pub mod clock;
pub mod credentials;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod mock;
pub mod observation;
pub mod provision;
pub mod response;
pub mod retry;
pub mod session;
pub mod transport;
pub mod xml;

pub use bus::{ChannelBus, SampleReceiver};
pub use client::{Client, ClientState, PersonSelector};
pub use clock::{MessageClock, now_utc_string};
pub use credentials::{CredentialStore, FileCredentialStore};
pub use envelope::{Info, InfoBody, Method};
pub use error::{Error, ErrorKind, Result, UsageError};
pub use observation::{DataXml, Observation};
pub use provision::{ensure_app_instance, ensure_client, provision};
pub use response::{CODE_OK, CODE_SESSION_EXPIRED, Reply};
pub use retry::{RetryConfig, with_retry};
pub use session::{AppInstance, Session};
pub use transport::{DEFAULT_REQUEST_TIMEOUT, HttpResponse, HttpsTransport, Transport};

// Re-export from hvgate-types
pub use hvgate_types::{Person, RecordType, Sample, record_types};
