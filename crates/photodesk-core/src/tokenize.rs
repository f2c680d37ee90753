//! Text tokenizer shared by candidate scoring and download reconciliation.
//!
//! A token is a run of at least three ASCII lowercase letters or digits,
//! taken after lowercasing the input. Everything else (punctuation,
//! whitespace, non-ASCII letters) separates tokens. Tokens on the
//! [`STOPWORDS`] list are dropped.
//!
//! # Example
//!
//! ```rust
//! use photodesk_core::tokenize::tokenize;
//!
//! let tokens = tokenize("a photo for a story about the supreme court");
//! assert!(tokens.contains("supreme"));
//! assert!(!tokens.contains("photo"));
//! ```

use std::collections::HashSet;

/// Minimum token length in characters.
pub const MIN_TOKEN_LEN: usize = 3;

/// Generic nouns and function words that carry no matching signal.
pub const STOPWORDS: &[&str] = &[
    "photo", "photos", "image", "images", "story", "stories", "news", "getty", "about", "with",
    "from", "that", "this", "there", "their", "the", "and", "for",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn raw_tokens(lowered: &str) -> impl Iterator<Item = &str> {
    lowered
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !is_stopword(t))
}

/// Tokenize text into an unordered set.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    raw_tokens(&lowered).map(str::to_string).collect()
}

/// Tokenize text, keeping each distinct token once in order of first
/// appearance.
///
/// Used where a bounded prefix of the token set is needed and the
/// result must be deterministic.
pub fn tokenize_ordered(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in raw_tokens(&lowered) {
        if seen.insert(token) {
            out.push(token.to_string());
        }
    }
    out
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
