use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z][a-z0-9+.\-]*://[^\s/?#]+([/?#]\S*)?$").expect("valid regex")
});

/// Accepts `scheme://host[...]` with no whitespace.
pub fn is_valid_url(input: &str) -> bool {
    let trimmed = input.trim();
    !trimmed.is_empty() && URL_PATTERN.is_match(trimmed)
}
