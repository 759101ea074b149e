//! `*` wildcards as anchored regular expressions.

use regex::Regex;

pub fn is_wildcard(s: &str) -> bool {
    s.contains('*')
}

/// Compile `pattern` so that `*` matches any run of characters and everything
/// else matches literally.
pub fn compile(pattern: &str) -> Regex {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).expect("escaped glob is a valid pattern")
}

/// Keep the items of `candidates` that match `pattern`, in order.
pub fn filter(pattern: &str, candidates: Vec<String>) -> Vec<String> {
    let re = compile(pattern);
    candidates.into_iter().filter(|c| re.is_match(c)).collect()
}
