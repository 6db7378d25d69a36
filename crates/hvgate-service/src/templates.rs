//! Channel table and record templates.
//!
//! Each known channel maps to one record type and a renderer producing the
//! `data-xml` body for that type. Every body starts with a `<when>` block
//! built from the sample's capture time in UTC.
//!
//! | Channel | Record | Value |
//! |---------|--------|-------|
//! | `oximeter.spo2` | blood oxygen saturation | percent, stored as a 0..=1 fraction |
//! | `oximeter.pulse` | heart rate | beats per minute, rounded |
//! | `scale.weight` | weight | kilograms |
//! | `thermometer.temperature` | vital signs | degrees Celsius |
//! | `glucometer.glucose` | blood glucose | mmol/L |

use std::collections::HashSet;
use std::fmt;

use hvgate_core::xml::escape;
use hvgate_core::{DataXml, Observation};
use hvgate_types::{RecordType, Sample, record_types};
use thiserror::Error;
use time::OffsetDateTime;

/// A sample that cannot be turned into a record body.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// NaN or infinite value.
    #[error("{channel}: value is not finite")]
    NonFinite {
        /// Channel of the sample.
        channel: String,
    },

    /// Value outside what the record type accepts.
    #[error("{channel}: value {value} outside {min}..={max}")]
    OutOfRange {
        /// Channel of the sample.
        channel: String,
        /// Offending value.
        value: f64,
        /// Smallest accepted value.
        min: f64,
        /// Largest accepted value.
        max: f64,
    },

    /// The rendered body is not a single well-formed element.
    #[error("{channel}: rendered body is malformed: {message}")]
    Malformed {
        /// Channel of the sample.
        channel: String,
        /// Parser message.
        message: String,
    },
}

type Renderer = fn(&Sample) -> String;

/// One row of the channel table.
pub struct ChannelSpec {
    /// Channel name.
    pub channel: &'static str,
    /// Record type written for this channel.
    pub record_type: RecordType,
    /// Smallest accepted sample value.
    pub min: f64,
    /// Largest accepted sample value.
    pub max: f64,
    render: Renderer,
}

impl fmt::Debug for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSpec")
            .field("channel", &self.channel)
            .field("record_type", &self.record_type)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

impl ChannelSpec {
    /// Render the `data-xml` body for a sample.
    pub fn render(&self, sample: &Sample) -> Result<String, RenderError> {
        if !sample.value.is_finite() {
            return Err(RenderError::NonFinite {
                channel: sample.channel.clone(),
            });
        }
        if sample.value < self.min || sample.value > self.max {
            return Err(RenderError::OutOfRange {
                channel: sample.channel.clone(),
                value: sample.value,
                min: self.min,
                max: self.max,
            });
        }
        Ok((self.render)(sample))
    }

    /// Render and validate, producing an observation ready for upload.
    pub fn observation(&self, sample: &Sample) -> Result<Observation, RenderError> {
        let body = self.render(sample)?;
        let data_xml = DataXml::new(body).map_err(|e| RenderError::Malformed {
            channel: sample.channel.clone(),
            message: e.to_string(),
        })?;
        Ok(Observation::new(
            sample.channel.clone(),
            self.record_type,
            data_xml,
            sample.captured_at,
        ))
    }
}

/// Every channel the gateway knows.
pub static CHANNELS: &[ChannelSpec] = &[
    ChannelSpec {
        channel: "oximeter.spo2",
        record_type: record_types::BLOOD_OXYGEN_SATURATION,
        min: 0.0,
        max: 100.0,
        render: render_spo2,
    },
    ChannelSpec {
        channel: "oximeter.pulse",
        record_type: record_types::HEART_RATE,
        min: 0.0,
        max: 400.0,
        render: render_pulse,
    },
    ChannelSpec {
        channel: "scale.weight",
        record_type: record_types::WEIGHT,
        min: 0.0,
        max: 1000.0,
        render: render_weight,
    },
    ChannelSpec {
        channel: "thermometer.temperature",
        record_type: record_types::VITAL_SIGNS,
        min: 20.0,
        max: 50.0,
        render: render_temperature,
    },
    ChannelSpec {
        channel: "glucometer.glucose",
        record_type: record_types::BLOOD_GLUCOSE,
        min: 0.0,
        max: 100.0,
        render: render_glucose,
    },
];

/// Look up a channel in the full table.
pub fn lookup(channel: &str) -> Option<&'static ChannelSpec> {
    CHANNELS.iter().find(|spec| spec.channel == channel)
}

/// Names of every known channel, in table order.
pub fn channel_names() -> impl Iterator<Item = &'static str> {
    CHANNELS.iter().map(|spec| spec.channel)
}

/// The set of channels a bridge forwards.
#[derive(Debug, Clone)]
pub struct ChannelTable {
    entries: Vec<&'static ChannelSpec>,
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::all()
    }
}

impl ChannelTable {
    /// Every known channel.
    pub fn all() -> Self {
        Self {
            entries: CHANNELS.iter().collect(),
        }
    }

    /// Only the named channels. Unknown names are returned as the error.
    pub fn subset<S: AsRef<str>>(names: &[S]) -> Result<Self, Vec<String>> {
        let mut entries = Vec::new();
        let mut unknown = Vec::new();
        let mut seen = HashSet::new();
        for name in names {
            let name = name.as_ref();
            match lookup(name) {
                Some(spec) => {
                    if seen.insert(spec.channel) {
                        entries.push(spec);
                    }
                }
                None => unknown.push(name.to_string()),
            }
        }
        if unknown.is_empty() {
            Ok(Self { entries })
        } else {
            Err(unknown)
        }
    }

    /// Table for an optional configured subset.
    pub fn from_config(channels: Option<&[String]>) -> Result<Self, Vec<String>> {
        match channels {
            Some(names) => Self::subset(names),
            None => Ok(Self::all()),
        }
    }

    /// Entry for a channel, if forwarded.
    pub fn get(&self, channel: &str) -> Option<&'static ChannelSpec> {
        self.entries.iter().copied().find(|spec| spec.channel == channel)
    }

    /// Forwarded channel names.
    pub fn channels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|spec| spec.channel)
    }

    /// Number of forwarded channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no channel is forwarded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn when_block(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!(
        "<when><date><y>{}</y><m>{}</m><d>{}</d></date>\
         <time><h>{}</h><m>{}</m><s>{}</s><f>{}</f></time></when>",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        at.millisecond()
    )
}

fn display(value: &str, units: &str) -> String {
    format!(
        r#"<display units="{}">{}</display>"#,
        escape(units),
        escape(value)
    )
}

fn render_spo2(sample: &Sample) -> String {
    let fraction = sample.value / 100.0;
    format!(
        "<blood-oxygen-saturation>{}<value>{:.4}</value></blood-oxygen-saturation>",
        when_block(sample.captured_at),
        fraction
    )
}

fn render_pulse(sample: &Sample) -> String {
    format!(
        "<heart-rate>{}<value>{}</value></heart-rate>",
        when_block(sample.captured_at),
        sample.value.round() as i64
    )
}

fn render_weight(sample: &Sample) -> String {
    let kg = format!("{:.2}", sample.value);
    format!(
        "<weight>{}<value><kg>{}</kg>{}</value></weight>",
        when_block(sample.captured_at),
        kg,
        display(&kg, "kg")
    )
}

fn render_temperature(sample: &Sample) -> String {
    format!(
        "<vital-signs>{}<vital-signs-results><title><text>Temperature</text></title>\
         <value>{:.1}</value><unit><text>C</text></unit></vital-signs-results></vital-signs>",
        when_block(sample.captured_at),
        sample.value
    )
}

fn render_glucose(sample: &Sample) -> String {
    let mmol = format!("{:.1}", sample.value);
    format!(
        "<blood-glucose>{}<value><mmolPerL>{}</mmolPerL>{}</value>\
         <glucose-measurement-type><text>Whole blood</text></glucose-measurement-type></blood-glucose>",
        when_block(sample.captured_at),
        mmol,
        display(&mmol, "mmol/L")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hvgate_core::xml::Element;
    use time::macros::datetime;

    fn sample(channel: &str, value: f64) -> Sample {
        Sample::new(channel, value, datetime!(2024-01-02 03:04:05.678 UTC)).unwrap()
    }

    #[test]
    fn test_every_channel_renders_well_formed() {
        let values = [97.0, 72.4, 70.25, 36.6, 5.4];
        for (spec, value) in CHANNELS.iter().zip(values) {
            let obs = spec.observation(&sample(spec.channel, value)).unwrap();
            assert_eq!(obs.record_type, spec.record_type);
            let root = Element::parse(obs.data_xml.as_str()).unwrap();
            assert_eq!(root.find_text("y"), Some("2024"));
            assert_eq!(root.find_text("h"), Some("3"));
            assert_eq!(root.find_text("f"), Some("678"));
        }
    }

    #[test]
    fn test_spo2_is_a_fraction() {
        let body = lookup("oximeter.spo2")
            .unwrap()
            .render(&sample("oximeter.spo2", 97.0))
            .unwrap();
        let root = Element::parse(&body).unwrap();
        assert_eq!(root.name(), "blood-oxygen-saturation");
        assert_eq!(
            root.children().last().map(|c| c.text()),
            Some("0.9700")
        );

        let body = lookup("oximeter.spo2")
            .unwrap()
            .render(&sample("oximeter.spo2", 99.9))
            .unwrap();
        assert!(body.ends_with("<value>0.9990</value></blood-oxygen-saturation>"));
    }

    #[test]
    fn test_pulse_is_rounded() {
        let body = lookup("oximeter.pulse")
            .unwrap()
            .render(&sample("oximeter.pulse", 72.6))
            .unwrap();
        assert!(body.ends_with("<value>73</value></heart-rate>"));
    }

    #[test]
    fn test_weight_has_display() {
        let body = lookup("scale.weight")
            .unwrap()
            .render(&sample("scale.weight", 70.0))
            .unwrap();
        let root = Element::parse(&body).unwrap();
        assert_eq!(root.find_text("kg"), Some("70.00"));
        assert_eq!(root.find("display").and_then(|d| d.attr("units")), Some("kg"));
    }

    #[test]
    fn test_out_of_range_and_non_finite() {
        let spec = lookup("thermometer.temperature").unwrap();
        let err = spec.render(&sample("thermometer.temperature", 99.0)).unwrap_err();
        assert!(matches!(err, RenderError::OutOfRange { .. }));

        let mut bad = sample("thermometer.temperature", 36.0);
        bad.value = f64::NAN;
        assert!(matches!(
            spec.observation(&bad),
            Err(RenderError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("unmapped").is_none());
        assert_eq!(channel_names().count(), 5);
    }

    #[test]
    fn test_subset() {
        let table = ChannelTable::subset(&["oximeter.pulse", "oximeter.pulse"]).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get("oximeter.pulse").is_some());
        assert!(table.get("scale.weight").is_none());

        let err = ChannelTable::subset(&["oximeter.pulse", "nope"]).unwrap_err();
        assert_eq!(err, vec!["nope".to_string()]);

        assert_eq!(ChannelTable::from_config(None).unwrap().len(), CHANNELS.len());
    }
}
