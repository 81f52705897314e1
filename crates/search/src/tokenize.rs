//! Shared tokenizer for indexing, querying, and vectors
//!
//! A token is two or more word characters or CJK ideographs, lowercased.
//! The same pattern must be used on both sides of the index or queries
//! stop matching documents.

use regex::Regex;
use std::sync::OnceLock;

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"[\w\x{4e00}-\x{9fff}]{2,}").expect("static token pattern")
    })
}

pub fn tokenize(text: &str) -> Vec<String> {
    token_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}
