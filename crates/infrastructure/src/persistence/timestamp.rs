//! Timestamp text encoding
//!
//! Timestamps are stored as fixed-width UTC RFC 3339 strings so that SQL
//! text comparison orders them chronologically.

use application::error::ApplicationError;
use chrono::{DateTime, SecondsFormat, Utc};

use super::error::corrupt_row;

/// Encode a timestamp for storage
pub fn encode(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp
pub fn decode(column: &str, value: &str) -> Result<DateTime<Utc>, ApplicationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt_row(column, e))
}

/// Decode an optional stored timestamp
pub fn decode_opt(
    column: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ApplicationError> {
    value.map(|v| decode(column, v)).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn encoding_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let late = early + Duration::milliseconds(1);
        assert!(encode(early) < encode(late));
        assert_eq!(encode(early), "2025-01-01T09:00:00.000000Z");
    }

    #[test]
    fn decode_reverses_encode() {
        let at = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap();
        assert_eq!(decode("created_at", &encode(at)).unwrap(), at);
        assert!(decode("created_at", "yesterday").is_err());
        assert_eq!(decode_opt("revoked_at", None).unwrap(), None);
    }
}
