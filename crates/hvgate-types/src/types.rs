//! Core types shared between the client and the bridge.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ParseError, ParseResult};

/// Identifier for a kind of observation understood by the record service.
///
/// Record types are UUID-shaped and rendered in lowercase hyphenated form,
/// which is what the service expects inside `<type-id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RecordType(Uuid);

impl RecordType {
    /// Wrap a UUID as a record type.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordType {
    type Err = ParseError;

    /// Parse a record type from its UUID text.
    ///
    /// # Examples
    ///
    /// ```
    /// use hvgate_types::{RecordType, record_types};
    ///
    /// let parsed: RecordType = "b81eb4a6-6eac-4292-ae93-3872d6870994".parse().unwrap();
    /// assert_eq!(parsed, record_types::HEART_RATE);
    /// assert!("not-a-uuid".parse::<RecordType>().is_err());
    /// ```
    fn from_str(s: &str) -> ParseResult<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseError::InvalidRecordType(s.to_string()))
    }
}

impl From<Uuid> for RecordType {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A single named measurement delivered on the channel bus.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// Channel name, e.g. `oximeter.spo2`.
    pub channel: String,
    /// Measured value in the channel's native unit.
    pub value: f64,
    /// When the measurement was taken.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub captured_at: OffsetDateTime,
}

impl Sample {
    /// Create a sample, validating the channel name and value.
    pub fn new(
        channel: impl Into<String>,
        value: f64,
        captured_at: OffsetDateTime,
    ) -> ParseResult<Self> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(ParseError::EmptyChannel);
        }
        if !value.is_finite() {
            return Err(ParseError::NonFiniteValue { channel });
        }
        Ok(Self {
            channel,
            value,
            captured_at,
        })
    }

    /// Create a sample stamped with the current UTC time.
    pub fn now(channel: impl Into<String>, value: f64) -> ParseResult<Self> {
        Self::new(channel, value, OffsetDateTime::now_utc())
    }
}

/// A subject whose records the gateway may read and write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Person {
    /// Service-assigned person identifier.
    pub person_id: String,
    /// Identifier of the record the gateway writes to.
    pub record_id: String,
    /// Human-readable name of the record.
    pub display_name: String,
}

impl Person {
    /// Create a person entry.
    pub fn new(
        person_id: impl Into<String>,
        record_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            person_id: person_id.into(),
            record_id: record_id.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (record {})", self.display_name, self.record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_types;

    #[test]
    fn test_record_type_display_is_lowercase_hyphenated() {
        let rt: RecordType = "3A54F95F-03D8-4F62-815F-F691FC94A500".parse().unwrap();
        assert_eq!(rt.to_string(), "3a54f95f-03d8-4f62-815f-f691fc94a500");
        assert_eq!(rt, record_types::BLOOD_OXYGEN_SATURATION);
    }

    #[test]
    fn test_record_type_parse_trims() {
        let rt: RecordType = "  b81eb4a6-6eac-4292-ae93-3872d6870994\n".parse().unwrap();
        assert_eq!(rt, record_types::HEART_RATE);
    }

    #[test]
    fn test_record_type_parse_error() {
        let err = "heart-rate".parse::<RecordType>().unwrap_err();
        assert_eq!(err, ParseError::InvalidRecordType("heart-rate".to_string()));
    }

    #[test]
    fn test_sample_rejects_empty_channel() {
        assert_eq!(Sample::now("  ", 1.0), Err(ParseError::EmptyChannel));
    }

    #[test]
    fn test_sample_rejects_non_finite() {
        assert!(matches!(
            Sample::now("oximeter.spo2", f64::NAN),
            Err(ParseError::NonFiniteValue { .. })
        ));
        assert!(Sample::now("oximeter.spo2", f64::INFINITY).is_err());
    }

    #[test]
    fn test_person_display() {
        let person = Person::new("P1", "R1", "Alice");
        assert_eq!(person.to_string(), "Alice (record R1)");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sample_serde_roundtrip() {
        let json = r#"{"channel":"oximeter.pulse","value":72.0,"captured_at":"2024-03-01T10:20:30Z"}"#;
        let sample: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.channel, "oximeter.pulse");
        assert_eq!(sample.captured_at.hour(), 10);

        let back = serde_json::to_string(&sample).unwrap();
        assert!(back.contains("2024-03-01T10:20:30Z"));
    }
}
