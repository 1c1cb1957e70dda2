//! # Temporal Helpers
//!
//! All instants are `DateTime<Utc>`. Client input is accepted leniently
//! (full RFC 3339, bare `YYYY-MM-DD`, or a naive ISO datetime interpreted
//! as UTC), while comparison and audit output always use one canonical
//! form: RFC 3339 with millisecond precision and a `Z` suffix.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

/// Parse a client-supplied date or datetime.
///
/// Returns `None` if the input matches none of the accepted forms.
pub fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Canonical string form used for comparisons and audit values.
pub fn canonical(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar-date portion (`YYYY-MM-DD`) of an instant.
pub fn date_only(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// Parse an `HH:MM` or `HH:MM:SS` wall-clock time.
pub fn parse_wall_clock(input: &str) -> Option<NaiveTime> {
    let s = input.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
