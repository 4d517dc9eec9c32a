//! URL helpers.

/// Strips the query string and fragment from a URL and trims whitespace.
///
/// Two listings of the same page that only differ in tracking parameters map
/// to the same identity.
pub fn strip_query(url: &str) -> &str {
    let url = url.trim();
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Extracts the `host[:port]` part from an absolute http(s) URL.
///
/// Returns `None` when the URL is not absolute http(s) or has no host.
pub fn extract_host(url: &str) -> Option<String> {
    // Accept only absolute http(s) URLs.
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;

    // host[:port] is until first '/', '?', or '#'.
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let mut host_port = &rest[..end];

    // Strip potential userinfo (user:pass@host).
    if let Some(at) = host_port.rfind('@') {
        host_port = &host_port[at + 1..];
    }

    if host_port.is_empty() {
        None
    } else {
        Some(host_port.to_string())
    }
}

/// Returns the last non-empty path segment of an http(s) URL.
pub fn last_path_segment(url: &str) -> Option<&str> {
    let path = strip_query(url);
    let rest = path
        .strip_prefix("https://")
        .or_else(|| path.strip_prefix("http://"))?;
    let (_, path) = rest.split_once('/')?;
    path.split('/').rev().find(|segment| !segment.is_empty())
}
