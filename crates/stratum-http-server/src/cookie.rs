//! `SESSION` cookie extraction and formatting.

use http::HeaderMap;
use http::header::{COOKIE, HeaderValue, InvalidHeaderValue};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "SESSION";

/// Find the `SESSION=<value>` pair in the request's `Cookie` headers.
///
/// Returns the first non-empty value. Headers that are not valid visible ASCII are skipped.
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| name.trim() == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

/// `Set-Cookie` value pinning the client to `session_id`
pub fn session_cookie_value(session_id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{SESSION_COOKIE}={session_id}"))
}
