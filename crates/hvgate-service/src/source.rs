//! Line-oriented sample source.
//!
//! Reads one JSON object per line and publishes each as a [`Sample`]:
//!
//! ```text
//! {"channel": "oximeter.pulse", "value": 72}
//! {"channel": "scale.weight", "value": 70.4, "captured_at": "2024-01-02T03:04:05Z"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Lines that do not
//! parse are logged and skipped. Samples without `captured_at` are stamped
//! with the time they were read.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use hvgate_core::ChannelBus;
use hvgate_types::{ParseError, Sample};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// A line that could not be turned into a sample.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Not a JSON object of the expected shape.
    #[error("invalid sample line: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON carrying an unusable sample.
    #[error("invalid sample: {0}")]
    Sample(#[from] ParseError),
}

#[derive(Debug, Deserialize)]
struct LineSample {
    channel: String,
    value: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    captured_at: Option<OffsetDateTime>,
}

/// Parse one line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Sample>, SourceError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let parsed: LineSample = serde_json::from_str(line)?;
    let captured_at = parsed.captured_at.unwrap_or_else(OffsetDateTime::now_utc);
    Ok(Some(Sample::new(parsed.channel, parsed.value, captured_at)?))
}

/// Read `reader` on a dedicated thread, publishing every sample to `bus`.
///
/// The thread ends at end of input or on a read error and returns the number
/// of samples published. Its clone of the bus is dropped on exit.
pub fn spawn_line_source<R>(reader: R, bus: ChannelBus) -> std::io::Result<JoinHandle<u64>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("hvgate-line-source".to_string())
        .spawn(move || read_lines(reader, &bus))
}

fn read_lines<R: BufRead>(reader: R, bus: &ChannelBus) -> u64 {
    let mut published = 0u64;
    for (number, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Sample source read failed: {}", e);
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(sample)) => {
                debug!("Read {} = {}", sample.channel, sample.value);
                bus.publish(sample);
                published += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping line {}: {}", number + 1, e),
        }
    }
    info!("Sample source finished after {} sample(s)", published);
    published
}
