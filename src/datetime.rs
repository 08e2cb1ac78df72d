//! Date/time utilities for feedrelay.
//!
//! SQLite stores timestamps as `YYYY-MM-DD HH:MM:SS` text in UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Storage format used for timestamp columns.
pub const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a stored timestamp (RFC3339 or SQLite format) as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, DB_FORMAT) {
        return Some(naive.and_utc());
    }
    None
}

/// Format a UTC timestamp for storage.
pub fn to_db_string(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Convert a database datetime string (YYYY-MM-DD HH:MM:SS) to RFC3339 format.
///
/// The database stores times in UTC, so this appends 'Z'.
pub fn to_rfc3339(datetime_str: &str) -> String {
    format!("{}Z", datetime_str.replace(' ', "T"))
}
