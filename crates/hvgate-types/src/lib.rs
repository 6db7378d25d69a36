//! Platform-agnostic types for the health record gateway.
//!
//! This crate provides the types shared by the session client
//! (hvgate-core) and the channel bridge (hvgate-service).
//!
//! # Features
//!
//! - [`Sample`]: a named measurement delivered by a sensor channel
//! - [`RecordType`]: UUID-shaped identifier of an observation kind
//! - [`Person`]: a subject the gateway is authorized to write for
//! - Well-known record type constants in [`record_types`]
//!
//! # Example
//!
//! ```
//! use hvgate_types::{Sample, record_types};
//!
//! let sample = Sample::now("oximeter.pulse", 72.0).unwrap();
//! assert_eq!(sample.channel, "oximeter.pulse");
//! assert_eq!(
//!     record_types::HEART_RATE.to_string(),
//!     "b81eb4a6-6eac-4292-ae93-3872d6870994"
//! );
//! ```

pub mod error;
pub mod record_types;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{Person, RecordType, Sample};
