//! Dataset hygiene applied once at load time.
//!
//! Scraped reference data sometimes carries first-person forum text. Those
//! entries are dropped rather than rewritten; everything else is trimmed,
//! whitespace-collapsed and de-duplicated case-insensitively.

use std::collections::HashSet;

/// Phrases that mark an entry as anecdote rather than reference data.
pub const FORUM_PHRASES: &[&str] = &[
    "i bought",
    "yesterday",
    "my car",
    "someone said",
    "it came up with",
];

/// True when `text` contains first-person forum phrasing.
pub fn is_forum_phrasing(text: &str) -> bool {
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    FORUM_PHRASES.iter().any(|p| lower.contains(p))
}

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a cause or fix list, preserving first-seen order.
pub fn sanitize_items(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|s| normalize_whitespace(s))
        .filter(|s| !s.is_empty())
        .filter(|s| !is_forum_phrasing(s))
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

/// Merge two lists, `front` first, de-duplicating case-insensitively.
pub fn merge_front(front: &[String], back: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    front
        .iter()
        .chain(back.iter())
        .filter(|s| seen.insert(s.to_lowercase()))
        .cloned()
        .collect()
}
