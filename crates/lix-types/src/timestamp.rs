use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Millisecond-precision timestamp.
///
/// Timestamps are stored and compared as milliseconds since the UNIX epoch
/// and rendered as ISO 8601 strings (`1970-01-01T00:00:00.000Z`) in rows.
/// Deterministic mode produces timestamps counting up from the epoch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    millis: u64,
}

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self { millis }
    }

    /// The UNIX epoch.
    pub const fn zero() -> Self {
        Self { millis: 0 }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    /// ISO 8601 rendering with millisecond precision and a `Z` suffix.
    pub fn to_iso(&self) -> String {
        let millis = i64::try_from(self.millis).unwrap_or(i64::MAX);
        DateTime::<Utc>::from_timestamp_millis(millis)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Parse an RFC 3339 / ISO 8601 string.
    pub fn parse_iso(s: &str) -> Result<Self, TypeError> {
        let parsed = DateTime::parse_from_rfc3339(s)
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s}: {e}")))?;
        let millis = parsed.timestamp_millis();
        if millis < 0 {
            return Err(TypeError::InvalidTimestamp(format!("{s}: before epoch")));
        }
        Ok(Self {
            millis: millis as u64,
        })
    }

    /// A timestamp strictly after `self`.
    pub fn next(&self) -> Self {
        Self {
            millis: self.millis.saturating_add(1),
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_iso())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_renders_iso() {
        assert_eq!(Timestamp::zero().to_iso(), "1970-01-01T00:00:00.000Z");
        assert_eq!(Timestamp::from_millis(1).to_iso(), "1970-01-01T00:00:00.001Z");
    }

    #[test]
    fn iso_roundtrip() {
        let ts = Timestamp::from_millis(1_700_000_000_123);
        assert_eq!(Timestamp::parse_iso(&ts.to_iso()).unwrap(), ts);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Timestamp::parse_iso("yesterday").is_err());
    }

    #[test]
    fn now_is_after_2020() {
        assert!(Timestamp::now().as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn iso_strings_sort_like_timestamps() {
        let a = Timestamp::from_millis(5);
        let b = Timestamp::from_millis(1_000);
        assert!(a < b);
        assert!(a.to_iso() < b.to_iso());
    }

    #[test]
    fn next_is_strictly_greater() {
        let ts = Timestamp::from_millis(10);
        assert!(ts.next() > ts);
    }
}
