//! UTC timestamps in the shape the record service requires.
//!
//! The service accepts `msg-time` and `signing-time` only as
//! `YYYY-MM-DDThh:mm:ss.ffffffZ`: six microsecond digits, zero padded,
//! followed by `Z`. Shorter fractions are rejected.

use std::sync::Mutex;

use time::{Duration, OffsetDateTime, UtcOffset};

/// Current UTC time formatted for `msg-time`.
pub fn now_utc_string() -> String {
    format_msg_time(OffsetDateTime::now_utc())
}

/// Format a timestamp as `YYYY-MM-DDThh:mm:ss.ffffffZ` in UTC.
///
/// # Examples
///
/// ```
/// use hvgate_core::clock::format_msg_time;
/// use time::OffsetDateTime;
///
/// let t = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_000_042_000).unwrap();
/// assert_eq!(format_msg_time(t), "2023-11-14T22:13:20.000042Z");
/// ```
pub fn format_msg_time(timestamp: OffsetDateTime) -> String {
    let utc = timestamp.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        utc.year(),
        u8::from(utc.month()),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second(),
        utc.microsecond()
    )
}

/// Source of strictly increasing message timestamps.
///
/// Two requests signed by the same client never carry the same `msg-time`:
/// when the wall clock has not moved past the last value handed out, the
/// clock advances by one microsecond.
#[derive(Debug, Default)]
pub struct MessageClock {
    last: Mutex<Option<OffsetDateTime>>,
}

impl MessageClock {
    /// Create a new clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp, truncated to microseconds.
    pub fn next(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let now = now - Duration::nanoseconds(i64::from(now.nanosecond() % 1_000));

        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    /// Next timestamp formatted for `msg-time`.
    pub fn next_string(&self) -> String {
        format_msg_time(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_msg_time_shape(s: &str) -> bool {
        let bytes = s.as_bytes();
        if bytes.len() != 27 {
            return false;
        }
        bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            10 => *b == b'T',
            13 | 16 => *b == b':',
            19 => *b == b'.',
            26 => *b == b'Z',
            _ => b.is_ascii_digit(),
        })
    }

    #[test]
    fn test_now_utc_string_shape() {
        let s = now_utc_string();
        assert!(matches_msg_time_shape(&s), "bad shape: {}", s);
    }

    #[test]
    fn test_fraction_is_zero_padded() {
        let t = OffsetDateTime::from_unix_timestamp_nanos(1_000_000_000_000_007_000).unwrap();
        assert_eq!(format_msg_time(t), "2001-09-09T01:46:40.000007Z");
    }

    #[test]
    fn test_non_utc_offset_is_converted() {
        let t = OffsetDateTime::from_unix_timestamp(0)
            .unwrap()
            .to_offset(UtcOffset::from_hms(2, 0, 0).unwrap());
        assert_eq!(format_msg_time(t), "1970-01-01T00:00:00.000000Z");
    }

    #[test]
    fn test_message_clock_strictly_increases() {
        let clock = MessageClock::new();
        let mut prev = clock.next();
        for _ in 0..1_000 {
            let next = clock.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_message_clock_strings_differ() {
        let clock = MessageClock::new();
        let a = clock.next_string();
        let b = clock.next_string();
        assert_ne!(a, b);
        assert!(matches_msg_time_shape(&a));
        assert!(matches_msg_time_shape(&b));
    }
}
