//! Outbound observations.

use std::fmt;

use hvgate_types::RecordType;
use time::OffsetDateTime;

use crate::error::Result;
use crate::xml;

/// A `data-xml` body that has been checked to be one well-formed element.
///
/// The client embeds it verbatim; it is never reinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataXml(String);

impl DataXml {
    /// Validate and wrap a fragment.
    ///
    /// # Examples
    ///
    /// ```
    /// use hvgate_core::DataXml;
    ///
    /// assert!(DataXml::new("<heart-rate><value>72</value></heart-rate>").is_ok());
    /// assert!(DataXml::new("<heart-rate><value>72</heart-rate>").is_err());
    /// ```
    pub fn new(fragment: impl Into<String>) -> Result<Self> {
        let fragment = fragment.into();
        xml::check_well_formed(&fragment)?;
        Ok(Self(fragment))
    }

    /// The fragment text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One record write produced from a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Channel the sample arrived on.
    pub channel: String,
    /// Kind of record to write.
    pub record_type: RecordType,
    /// Record body.
    pub data_xml: DataXml,
    /// When the underlying sample was taken.
    pub captured_at: OffsetDateTime,
}

impl Observation {
    /// Create an observation.
    pub fn new(
        channel: impl Into<String>,
        record_type: RecordType,
        data_xml: DataXml,
        captured_at: OffsetDateTime,
    ) -> Self {
        Self {
            channel: channel.into(),
            record_type,
            data_xml,
            captured_at,
        }
    }
}
