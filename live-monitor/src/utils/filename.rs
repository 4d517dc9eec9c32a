//! Filename helpers for recording outputs.
//!
//! Source identifiers end up inside recording filenames, so anything that
//! is not safe on Windows, Linux or macOS is replaced. Unicode letters
//! (Chinese room names, for instance) are kept as-is.

/// Characters that are invalid in Windows filenames.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved device names (case-insensitive).
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Fallback used when nothing usable is left after sanitizing.
pub const UNNAMED: &str = "unnamed";

/// Turn an arbitrary string into a single filename component.
///
/// Control characters, whitespace and characters rejected by Windows are
/// replaced with `_` (runs collapse into one), leading/trailing dots and
/// underscores are trimmed, and reserved device names are prefixed with `_`.
///
/// ```
/// use live_monitor::utils::filename::sanitize_component;
///
/// assert_eq!(sanitize_component("room 123"), "room_123");
/// assert_eq!(sanitize_component("直播间?"), "直播间");
/// assert_eq!(sanitize_component(""), "unnamed");
/// ```
pub fn sanitize_component(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_replacement = false;

    for c in input.chars() {
        if c.is_control() || c.is_whitespace() || INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        return UNNAMED.to_string();
    }

    let upper = trimmed.to_uppercase();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| upper == *reserved || upper.starts_with(&format!("{reserved}.")))
    {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}
