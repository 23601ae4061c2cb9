//! Timestamp and calendar-day utilities
//!
//! Attendance is keyed by the local calendar day on which it was marked.
//! Days travel over the API and live in the database as `YYYY-MM-DD`.

use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDate, SecondsFormat, SubsecRound, Utc};

/// Wire and storage format for attendance days
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Get current UTC timestamp at the precision timestamps are stored with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Local calendar day containing `timestamp`
pub fn attendance_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// Today's local calendar day
pub fn today() -> NaiveDate {
    attendance_day(now())
}

/// Parse a `YYYY-MM-DD` day string
pub fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DAY_FORMAT)
        .map_err(|_| Error::InvalidInput(format!("Invalid date '{}', expected YYYY-MM-DD", value)))
}

/// Format a day as `YYYY-MM-DD`
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Fixed-width RFC 3339 form used for stored timestamps, so text ordering
/// in SQL matches chronological ordering
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp read back from the database
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}
