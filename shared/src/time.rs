//! Time-of-day and timestamp helpers
//!
//! The booking API sends slot times as `HH:MM` or `HH:MM:SS` strings and
//! appointment start times as ISO-8601 timestamps that may or may not
//! carry an offset.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{ModelError, ModelResult};

/// Parse a time of day in `HH:MM` or `HH:MM:SS` form
pub fn parse_time_of_day(value: &str) -> ModelResult<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| ModelError::InvalidTime(value.to_string()))
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> ModelResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ModelError::InvalidDate(value.to_string()))
}

/// `HH:MM` display form
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Wire form of a start time: `YYYY-MM-DDTHH:MM:SS`
pub fn format_start_time(date: NaiveDate, time: NaiveTime) -> String {
    date.and_time(time).format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parse a timestamp that is either naive (`2025-03-01T10:30:00`) or
/// RFC 3339 (`2025-03-01T10:30:00-03:00`). Offsets are dropped and the
/// wall-clock time of the business is kept.
pub fn parse_timestamp(value: &str) -> ModelResult<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| ModelError::InvalidTimestamp(value.to_string()))
}

/// Serde adapter for [`parse_timestamp`]
pub mod flexible_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%Y-%m-%dT%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_of_day_accepts_both_forms() {
        assert_eq!(
            parse_time_of_day("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("17:59:00").unwrap(),
            NaiveTime::from_hms_opt(17, 59, 0).unwrap()
        );
        assert!(matches!(
            parse_time_of_day("9h30"),
            Err(ModelError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_format_start_time_adds_seconds() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let time = parse_time_of_day("09:00").unwrap();
        assert_eq!(format_start_time(date, time), "2025-03-14T09:00:00");
    }

    #[test]
    fn test_parse_timestamp_naive_and_offset() {
        let naive = parse_timestamp("2025-03-14T09:00:00").unwrap();
        assert_eq!(format_hhmm(naive.time()), "09:00");

        let offset = parse_timestamp("2025-03-14T18:15:00-03:00").unwrap();
        assert_eq!(format_hhmm(offset.time()), "18:15");
        assert_eq!(offset.date(), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());

        let fractional = parse_timestamp("2025-03-14T09:00:00.123456").unwrap();
        assert_eq!(format_hhmm(fractional.time()), "09:00");

        assert!(parse_timestamp("yesterday").is_err());
    }
}
