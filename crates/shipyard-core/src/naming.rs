//! Resource name sanitization.
//!
//! Generated artifacts need names that are valid hostnames, compose service
//! names and Terraform identifiers. Every mapping here is deterministic.

use std::sync::LazyLock;

use regex::Regex;

static HOSTNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$").expect("hostname pattern"));

/// Longest DNS label.
const MAX_LABEL: usize = 63;

/// Whether `name` satisfies the server-name grammar.
pub fn is_hostname(name: &str) -> bool {
    HOSTNAME.is_match(name)
}

/// Map an arbitrary name onto `[a-z0-9-]`.
///
/// Lowercases, replaces every other character with `-`, collapses runs of
/// `-`, trims them from both ends and caps the result at 63 characters.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    let capped: String = trimmed.chars().take(MAX_LABEL).collect();
    capped.trim_end_matches('-').to_string()
}

/// Terraform resource identifier: `[a-z0-9_]`, never starting with a digit.
pub fn identifier(name: &str) -> String {
    let id = sanitize(name).replace('-', "_");
    match id.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("r_{id}"),
        None => "r_".to_string(),
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_grammar() {
        assert!(is_hostname("web-1"));
        assert!(is_hostname("a1"));
        assert!(!is_hostname("a"));
        assert!(!is_hostname("-web"));
        assert!(!is_hostname("web-"));
        assert!(!is_hostname("Web"));
        assert!(!is_hostname("web_1"));
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize("My App/API:v1.2"), "my-app-api-v1-2");
        assert_eq!(sanitize("--a__b--"), "a-b");
        assert_eq!(sanitize("ghcr.io/org/repo"), "ghcr-io-org-repo");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(62) + "-bcd";
        let out = sanitize(&long);
        assert!(out.len() <= 63);
        assert!(!out.ends_with('-'));
    }

    #[test]
    fn identifier_never_starts_with_digit() {
        assert_eq!(identifier("web-1"), "web_1");
        assert_eq!(identifier("1st"), "r_1st");
    }
}
