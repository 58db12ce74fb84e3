use std::sync::LazyLock;

use regex::Regex;

/// `http(s)://` followed by letters, digits, a fixed punctuation set and
/// percent-encoded bytes. `$-_` is a range and covers `/`, `:`, `?`, `=` and
/// the like.
static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z0-9$-_@.&+!*(),]|%[0-9a-fA-F]{2})+")
        .expect("Regex will always be valid")
});

/// Find all URLs in a message text or caption, left to right.
///
/// Duplicates are kept; each occurrence is checked on its own.
#[must_use]
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_REGEX.find_iter(text).map(|m| m.as_str()).collect()
}
