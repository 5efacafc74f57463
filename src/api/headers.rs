//! Side-channel metadata carried in response headers.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use reqwest::header::HeaderMap;
use url::Url;

use super::response::{LinkRelation, RateLimit};

/// Default header carrying the per-request correlation id.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-okta-request-id";

const RATE_LIMIT_HEADER: &str = "x-rate-limit-limit";
const RATE_REMAINING_HEADER: &str = "x-rate-limit-remaining";
const RATE_RESET_HEADER: &str = "x-rate-limit-reset";

/// `EEEE, dd LLL yyyy HH:mm:ss` followed by a UTC zone abbreviation.
const HTTP_DATE_FORMAT: &str = "%A, %d %b %Y %H:%M:%S";

static LINK_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn link_pattern() -> Option<&'static Regex> {
    LINK_PATTERN
        .get_or_init(|| Regex::new(r#"<([^>]+)>;\s*rel="([^"]+)""#).ok())
        .as_ref()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Correlation id, when a header name is configured and present.
pub fn request_id(headers: &HeaderMap, header_name: Option<&str>) -> Option<String> {
    header_name
        .and_then(|name| header_str(headers, name))
        .map(str::to_string)
}

/// Response date from the `Date` header.
pub fn response_date(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    header_str(headers, "date").and_then(parse_http_date)
}

/// Parse an HTTP `Date` value.
///
/// Accepts the full weekday form (`Tuesday, 15 Nov 1994 08:12:31 GMT`) and
/// the IMF-fixdate form (`Tue, 15 Nov 1994 08:12:31 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Some(local) = value
        .strip_suffix(" GMT")
        .or_else(|| value.strip_suffix(" UTC"))
    {
        if let Ok(naive) = NaiveDateTime::parse_from_str(local, HTTP_DATE_FORMAT) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Rate-limit snapshot; `None` when the server sent no limit.
pub fn rate_limit(headers: &HeaderMap) -> Option<RateLimit> {
    let limit = header_str(headers, RATE_LIMIT_HEADER)?.trim().parse().ok()?;
    let remaining = header_str(headers, RATE_REMAINING_HEADER).and_then(|v| v.trim().parse().ok());
    let reset = header_str(headers, RATE_RESET_HEADER)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    Some(RateLimit {
        limit,
        remaining,
        reset,
    })
}

/// Related-resource links from every `Link` header.
pub fn links(headers: &HeaderMap) -> HashMap<LinkRelation, Url> {
    headers
        .get_all("link")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_links)
        .collect()
}

/// Parse `<url>; rel="name"` pairs, skipping entries that do not parse.
pub fn parse_links(header: &str) -> HashMap<LinkRelation, Url> {
    let Some(pattern) = link_pattern() else {
        return HashMap::new();
    };
    pattern
        .captures_iter(header)
        .filter_map(|captures| {
            let url = Url::parse(captures.get(1)?.as_str()).ok()?;
            let relation = captures.get(2)?.as_str().parse::<LinkRelation>().ok()?;
            Some((relation, url))
        })
        .collect()
}
