// Utility functions

/// Composite identity key: `lowercase(name) + "-" + lowercase(location)`.
pub fn identity_key(name: &str, location: &str) -> String {
    format!("{}-{}", name.to_lowercase(), location.to_lowercase())
}

/// Trims and collapses every whitespace run to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `None` for absent, empty or whitespace-only strings.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
