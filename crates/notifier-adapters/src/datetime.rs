//! Best-effort datetime normalization for calendar and task inputs.
//!
//! Tool callers hand over datetimes in whatever shape they have: full
//! RFC 3339 with an offset, a naive ISO string, compact forms without
//! separators, or something else entirely. [`normalize_datetime`] reduces
//! everything it can parse to one canonical naive shape,
//! `YYYY-MM-DDTHH:MM:SS`, and passes anything else through unchanged so the
//! remote API gets the final say on validity.

use chrono::{NaiveDate, NaiveDateTime};

/// The canonical output shape.
const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fallback input formats tried after RFC 3339 parsing fails.
const FALLBACK_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H:%M:%S",
    "%Y%m%dT%H%M%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Normalize a free-text datetime into `YYYY-MM-DDTHH:MM:SS`.
///
/// An offset on the input (`Z` or `+HH:MM`) is dropped, not converted: the
/// wall-clock time is preserved as written and the separate timezone
/// parameter carries the zone. A date without a time becomes midnight.
/// Unparseable input is returned unchanged.
pub fn normalize_datetime(input: &str) -> String {
    let trimmed = input.trim();

    // Offset-carrying RFC 3339: keep the wall clock, drop the offset.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.naive_local().format(CANONICAL_FORMAT).to_string();
    }

    // Already-naive ISO in the canonical shape.
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, CANONICAL_FORMAT) {
        return dt.format(CANONICAL_FORMAT).to_string();
    }

    for format in FALLBACK_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return dt.format(CANONICAL_FORMAT).to_string();
        }
    }

    // Date only: midnight.
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return dt.format(CANONICAL_FORMAT).to_string();
        }
    }

    input.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
