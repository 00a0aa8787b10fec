// logtally - core/timestamp.rs
//
// Permissive date-time parsing shared by the line parsers and the filter
// interpreter's date-time coercion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Naive formats tried after separator normalisation (`T` -> space, and
/// `/` -> `-` for year-first dates). Most precise first.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Day/month-first formats tried on the raw input. US order wins for
/// ambiguous dates such as 01/02/2024.
const SLASH_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S",
];

/// Date-only formats, interpreted as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Parse `raw` as a date-time, accepting the common shapes found in server
/// logs.
///
/// Strategy:
///   1. RFC 3339 / ISO 8601 with an offset, converted to UTC.
///   2. Apache combined-log `15/Jan/2024:14:30:22 +0000`, converted to UTC.
///   3. Year-first naive date-times, with `T` or `/` separators and `.` or
///      `,` fractional seconds.
///   4. Slash or dot day/month-first date-times.
///   5. Date only, as midnight.
///
/// Returns `None` when nothing matches; callers decide whether that is a
/// discard or an error.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%d/%b/%Y:%H:%M:%S %z") {
        return Some(dt.naive_utc());
    }

    let normalised = normalise_year_first(trimmed);
    for format in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&normalised, format) {
            return Some(ndt);
        }
    }

    for format in SLASH_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ndt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Rewrite `2024/01/15T14:30:22,5` as `2024-01-15 14:30:22.5`.
///
/// Only applied when the input starts with a four-digit year, so US and GB
/// slash dates are left for the day/month-first formats.
fn normalise_year_first(s: &str) -> String {
    let year_first = s.len() >= 5
        && s.as_bytes()[..4].iter().all(u8::is_ascii_digit)
        && matches!(s.as_bytes()[4], b'-' | b'/');
    if !year_first {
        return s.to_string();
    }
    s.replacen('/', "-", 2).replacen('T', " ", 1).replace(',', ".")
}
