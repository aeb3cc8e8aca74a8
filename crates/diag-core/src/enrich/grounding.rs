//! Grounding of oracle replies against the supplied definition.
//!
//! The oracle may reorder and rephrase, never invent. Each returned item is
//! mapped back to the supplied item it refers to and replaced by that item's
//! canonical text; anything that maps to nothing is discarded.

use obd_catalog::CodeDefinition;

use super::oracle::OracleReply;

/// Minimum length of a fragment accepted as a containment match.
const MIN_FRAGMENT: usize = 6;

/// Oracle ordering restricted to supplied facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedRanking {
    pub causes: Vec<String>,
    pub fixes: Vec<String>,
    /// Returned items that matched nothing supplied.
    pub discarded: usize,
}

/// Strip list decoration such as `- `, `• `, `1. ` or `2) `.
pub fn strip_list_marker(item: &str) -> &str {
    item.trim()
        .trim_start_matches(|c: char| {
            matches!(c, '-' | '*' | '\u{2022}' | '.' | ')') || c.is_ascii_digit() || c.is_whitespace()
        })
        .trim()
}

/// Lowercased alphanumeric words; punctuation separates words.
fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `run` occurs in `hay` as consecutive whole words.
fn contains_run(hay: &[String], run: &[String]) -> bool {
    !run.is_empty() && hay.windows(run.len()).any(|w| w == run)
}

/// Find the supplied item `item` refers to: exact match first, then prefix,
/// then containment either way. All three compare whole words.
pub fn match_supplied<'a>(item: &str, supplied: &'a [String]) -> Option<&'a String> {
    let needle = words(strip_list_marker(item));
    if needle.is_empty() {
        return None;
    }
    let needle_len: usize = needle.iter().map(String::len).sum::<usize>() + needle.len() - 1;
    let keys: Vec<Vec<String>> = supplied.iter().map(|s| words(s)).collect();

    let exact = keys.iter().position(|k| *k == needle);
    let prefix = || {
        keys.iter()
            .position(|k| !k.is_empty() && needle.starts_with(k))
    };
    let contains = || {
        keys.iter().position(|k| {
            contains_run(&needle, k) || (needle_len >= MIN_FRAGMENT && contains_run(k, &needle))
        })
    };

    exact
        .or_else(prefix)
        .or_else(contains)
        .map(|i| &supplied[i])
}

/// Map `returned` onto `supplied`, then append supplied items the oracle omitted.
fn ground_list(returned: &[String], supplied: &[String]) -> (Vec<String>, usize) {
    let mut out: Vec<String> = Vec::new();
    let mut discarded = 0;

    for item in returned {
        match match_supplied(item, supplied) {
            Some(canonical) => {
                if !out.contains(canonical) {
                    out.push(canonical.clone());
                }
            }
            None => discarded += 1,
        }
    }

    if out.is_empty() {
        return (out, discarded);
    }
    for item in supplied {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    (out, discarded)
}

/// Ground a reply. `None` when not a single returned cause is grounded.
pub fn ground(
    definition: &CodeDefinition,
    reply: &OracleReply,
    max_causes: usize,
) -> Option<GroundedRanking> {
    let (mut causes, cause_discards) = ground_list(&reply.causes, &definition.causes);
    if causes.is_empty() {
        return None;
    }
    causes.truncate(max_causes);

    let (fixes, fix_discards) = ground_list(&reply.fixes, &definition.fixes);
    let fixes = if fixes.is_empty() {
        definition.fixes.clone()
    } else {
        fixes
    };

    Some(GroundedRanking {
        causes,
        fixes,
        discarded: cause_discards + fix_discards,
    })
}
