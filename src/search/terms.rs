//! Term extraction and matching.
//!
//! Every indexed text field keeps a denormalized term array on its record,
//! computed at write time. Matching is a set-membership test of the query
//! terms against the union of the enabled fields.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::url::normalize_url;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "in", "on", "at",
        "to", "for", "of", "with", "by", "from", "as", "and", "or", "but", "not", "no", "so",
        "if", "then",
    ]
    .into_iter()
    .collect()
});

/// Tokenize text into lowercase, deduplicated terms.
/// Filters out single-character terms and common stop words.
pub fn extract_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .map(|s| s.to_lowercase())
        .filter(|s| s.chars().count() > 1 && !STOP_WORDS.contains(s.as_str()))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Terms of a URL, taken from its normalized form so that scheme and
/// tracking noise never become searchable.
pub fn extract_url_terms(url: &str) -> Vec<String> {
    extract_terms(&normalize_url(url))
}

/// Query terms: whitespace-delimited, lowercased, run through the same
/// tokenizer as indexed text. Empty means "match all".
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split_whitespace()
        .flat_map(extract_terms)
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

/// Ordered union: existing terms first, then the new ones not yet present.
pub fn merge_terms(existing: &[String], new: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let mut merged = existing.to_vec();
    for term in new {
        if seen.insert(term.as_str()) {
            merged.push(term.clone());
        }
    }
    merged
}

/// AND semantics over query terms, OR over fields: every term must appear in
/// at least one of `fields`.
pub fn matches_all(query_terms: &[String], fields: &[&[String]]) -> bool {
    query_terms
        .iter()
        .all(|term| fields.iter().any(|field| field.contains(term)))
}
