//! Date formatting helpers for request signing and SAS tokens.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Formats a timestamp as RFC 1123, the format required in the `x-ms-date`
/// header and in the string-to-sign (§4.1).
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Formats a timestamp the way SAS `st`/`se`/`si` fields expect it.
pub fn format_sas_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parses a SAS-style datetime (`%Y-%m-%dT%H:%M:%SZ`), falling back to
/// RFC 3339 for callers that pass fractional seconds or an explicit offset.
pub fn parse_sas_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|dt| dt.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Parses an HTTP-date (RFC 1123, e.g. `Fri, 09 Oct 2009 21:04:30 GMT`), the
/// format `insertionTime`/`expirationTime`/`timeNextVisible` are returned in
/// (§4.5). RFC 1123's `GMT` zone is one of the obsolete zone names RFC 2822
/// parsing accepts, so `parse_from_rfc2822` handles it directly.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value).ok().map(|dt| dt.with_timezone(&Utc))
}
