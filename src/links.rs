//! Link discovery in note text.

use std::sync::LazyLock;

use regex::Regex;

static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://\S+").expect("link pattern is a valid regex"));

/// Extracts every `https://` link from `text` in order of appearance.
///
/// A link runs from the scheme to the next whitespace character. Links are
/// returned verbatim: no normalization and no deduplication, so a link that
/// appears twice is returned twice.
///
/// # Examples
///
/// ```
/// use noteflow::links::extract_links;
///
/// let links = extract_links("see https://a.example and https://b.example/x");
/// assert_eq!(links, vec!["https://a.example", "https://b.example/x"]);
/// ```
pub fn extract_links(text: &str) -> Vec<String> {
    LINK_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
