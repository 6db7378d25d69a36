//! Error types for parsing in hvgate-types.

use thiserror::Error;

/// Errors that can occur when parsing gateway types.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A record type identifier was not a valid UUID.
    #[error("Invalid record type '{0}'")]
    InvalidRecordType(String),

    /// A sample carried no channel name.
    #[error("Sample channel name is empty")]
    EmptyChannel,

    /// A sample value was NaN or infinite.
    #[error("Sample value for '{channel}' is not finite")]
    NonFiniteValue { channel: String },
}

/// Result type alias using hvgate-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
