//! Small text helpers shared by configuration and the remote client.

/// Trim optional text, mapping blank values to `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Base URL with surrounding whitespace and trailing slashes removed.
///
/// `None` unless the value is an `http(s)://` URL.
pub fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    is_http_url(trimmed).then(|| trimmed.to_string())
}

/// Shorten a response body for inclusion in an error message.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}
