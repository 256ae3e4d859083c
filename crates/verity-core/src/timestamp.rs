//! Lenient timestamp parsing for stored records.
//!
//! Records written by this crate carry RFC 3339 timestamps with an offset.
//! Older records were written with naive local-less timestamps such as
//! `2025-04-26T15:18:52.123456`; those are read as UTC.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an offset-carrying or naive timestamp, treating naive ones as UTC.
pub fn parse_lenient(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = raw.parse::<DateTime<Utc>>() {
        return Some(at);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_lenient(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw:?}")))
}

pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_lenient(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn offset_timestamps_keep_their_instant() {
        let at = parse_lenient("2025-04-26T17:18:52+02:00").unwrap();
        assert_eq!(at.hour(), 15);
        assert_eq!(parse_lenient("2025-04-26T15:18:52Z"), Some(at));
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let at = parse_lenient("2025-04-26T15:18:52.123456").unwrap();
        assert_eq!((at.year(), at.month(), at.day()), (2025, 4, 26));
        assert_eq!(at.hour(), 15);
        assert_eq!(at.nanosecond(), 123_456_000);

        assert!(parse_lenient("2025-04-26T15:18:52").is_some());
        assert!(parse_lenient("2025-04-26 15:18:52.5").is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_lenient("yesterday").is_none());
        assert!(parse_lenient("2025-04-26").is_none());
    }
}
