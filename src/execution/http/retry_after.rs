//! `Retry-After` header parsing.
//!
//! Accepts delta-seconds (`"120"`) or an HTTP-date
//! (`"Wed, 21 Oct 2015 07:28:00 GMT"`, plus the obsolete RFC 850 and asctime
//! forms). Results are whole seconds clamped to `[0, max_secs]`. Anything
//! unparseable is `None`, which is not the same as zero: a strategy that sees
//! `None` falls back to its own delay.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Parse a raw `Retry-After` value relative to the current time.
pub fn parse_retry_after(value: Option<&str>, max_secs: u64) -> Option<u64> {
    parse_retry_after_at(value, max_secs, Utc::now())
}

/// Parse a raw `Retry-After` value relative to `now`.
pub fn parse_retry_after_at(value: Option<&str>, max_secs: u64, now: DateTime<Utc>) -> Option<u64> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<i64>() {
        return Some(seconds.clamp(0, clamp_bound(max_secs)) as u64);
    }

    let date = parse_http_date(raw)?;
    let remaining_ms = (date - now).num_milliseconds();
    if remaining_ms <= 0 {
        return Some(0);
    }
    let seconds = (remaining_ms as u64).div_ceil(1000);
    Some(seconds.min(max_secs))
}

/// Read and parse the `Retry-After` header of a response.
pub fn retry_after_from_headers(headers: &HeaderMap, max_secs: u64) -> Option<u64> {
    let value = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok());
    parse_retry_after(value, max_secs)
}

fn clamp_bound(max_secs: u64) -> i64 {
    i64::try_from(max_secs).unwrap_or(i64::MAX)
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    httpdate::parse_http_date(raw).ok().map(DateTime::<Utc>::from)
}
