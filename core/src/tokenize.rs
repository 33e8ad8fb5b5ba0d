//! Word normalization for rhyme grouping.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z'\s]+").expect("valid non-word regex"));

/// Strip everything except ASCII letters, apostrophes and whitespace, then lowercase.
pub fn normalize(text: &str) -> String {
    NON_WORD_RE.replace_all(text, "").to_lowercase()
}

/// Split `text` into unique candidate words in first-seen order.
///
/// Repeated words collapse to a single entry. Highlighting searches the raw
/// text again, so every occurrence is still styled.
pub fn tokenize(text: &str, min_word_length: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let cleaned = normalize(text);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut tokens = Vec::new();
    for word in cleaned.split_whitespace() {
        if word.len() < min_word_length {
            continue;
        }
        if seen.insert(word) {
            tokens.push(word.to_string());
        }
    }
    tokens
}
