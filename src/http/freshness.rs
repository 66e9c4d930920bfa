//! HTTP freshness and validation rules for cached vendor datasets
//!
//! Both functions are pure: they never touch the network or the disk and
//! accept partial or malformed header data.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use reqwest::header::{
    CACHE_CONTROL, DATE, EXPIRES, HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH,
};
use tracing::debug;

use crate::version::cache::CacheEntry;

/// Format used for `If-Modified-Since` (IMF-fixdate, always GMT)
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Obsolete formats still accepted on input
const RFC850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Compute the instant a response stops being fresh.
///
/// `Cache-Control: max-age=N` (N > 0) wins and is anchored at the response
/// `Date` header, falling back to `fetched_at` when `Date` is missing or
/// unparsable. A `max-age` too large to represent is ignored. Otherwise a
/// parsable `Expires` header is used as is.
pub fn compute_expiry(headers: &HeaderMap, fetched_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(max_age) = header_str(headers, CACHE_CONTROL.as_str()).and_then(parse_max_age)
        && max_age > 0
    {
        let response_time = header_str(headers, DATE.as_str())
            .and_then(parse_http_date)
            .unwrap_or(fetched_at);
        let expiry =
            TimeDelta::try_seconds(max_age).and_then(|age| response_time.checked_add_signed(age));
        match expiry {
            Some(expiry) => return Some(expiry),
            None => debug!("Ignoring out of range max-age={}", max_age),
        }
    }

    header_str(headers, EXPIRES.as_str()).and_then(parse_http_date)
}

/// Build `If-Modified-Since` / `If-None-Match` from stored validators.
///
/// Both are sent when both are known; the server decides which one wins.
pub fn build_conditional_headers(entry: &CacheEntry) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(last_modified) = entry.last_modified
        && let Ok(value) = HeaderValue::from_str(&format_http_date(last_modified))
    {
        headers.insert(IF_MODIFIED_SINCE, value);
    }

    if let Some(etag) = entry.etag.as_deref() {
        match HeaderValue::from_str(etag.trim()) {
            Ok(value) => {
                headers.insert(IF_NONE_MATCH, value);
            }
            Err(e) => debug!("Ignoring unusable ETag {:?}: {}", etag, e),
        }
    }

    headers
}

/// Format an instant as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(instant: DateTime<Utc>) -> String {
    instant.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse any of the three HTTP date formats
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    [RFC850_FORMAT, ASCTIME_FORMAT]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Extract `max-age` from a `Cache-Control` value
fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value.trim().trim_matches('"').parse().ok()
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
