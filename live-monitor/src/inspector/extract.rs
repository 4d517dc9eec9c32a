//! Stream URL extraction from page bodies.

use std::sync::LazyLock;

use regex::Regex;

use crate::utils::url::strip_query;

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>\\)]+"#).unwrap());

/// Undo the escaping pages apply when they embed URLs in inline JSON or HTML.
fn unescape(body: &str) -> String {
    body.replace("\\u0026", "&")
        .replace("\\u002F", "/")
        .replace("\\u002f", "/")
        .replace("\\/", "/")
        .replace("&amp;", "&")
}

/// Whether a URL looks like a live media stream endpoint.
///
/// Accepts URLs mentioning `stream` that either point at an `.flv` resource
/// or contain a `stream-` path component.
pub fn is_stream_candidate(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if !lower.contains("stream") {
        return false;
    }
    strip_query(&lower).ends_with(".flv") || lower.contains("stream-")
}

/// Extract every stream candidate from a page body, in order of appearance.
pub fn find_stream_candidates(body: &str) -> Vec<String> {
    let body = unescape(body);
    let mut candidates: Vec<String> = Vec::new();

    for m in URL_REGEX.find_iter(&body) {
        let url = m.as_str();
        if is_stream_candidate(url) && !candidates.iter().any(|c| c == url) {
            candidates.push(url.to_string());
        }
    }

    candidates
}
