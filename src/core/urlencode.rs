//! Query-string and form encoding.
//!
//! Implements the `application/x-www-form-urlencoded` codec used by both the
//! request decoder and the response renderer.

use std::borrow::Cow;

/// Percent-encode a single parameter name or value.
#[must_use]
pub fn encode(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Decode a single percent-encoded component, treating `+` as a space as the
/// form-urlencoded rules require.
#[must_use]
pub fn decode(value: &str) -> String {
    let unplussed = value.replace('+', " ");
    urlencoding::decode(&unplussed).map_or(unplussed.clone(), Cow::into_owned)
}

/// Parse a query or form body into ordered name/value pairs.
///
/// Empty segments are skipped; a segment without `=` becomes a parameter with
/// an empty value.
#[must_use]
pub fn parse(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => (decode(name), decode(value)),
            None => (decode(segment), String::new()),
        })
        .collect()
}

/// Serialize name/value pairs as a query string, preserving order.
#[must_use]
pub fn to_query(params: &[(String, String)]) -> String {
    let mut query = String::new();
    for (name, value) in params {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&encode(name));
        query.push('=');
        query.push_str(&encode(value));
    }
    query
}
