//! Lenient resolution of user-typed entity type names and node ids.
//!
//! Three-tier resolution: exact match (ignoring case, plural and node type
//! prefix) → synonym lookup → error with suggestion.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{Error, Result};

// ── Synonym maps (typo recovery) ─────────────────────────────

pub static TYPE_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("item", "Product"),
        ("sku", "Product"),
        ("merchandise", "Product"),
        ("category", "Collection"),
        ("catalog", "Collection"),
        ("config", "Space"),
        ("settings", "Space"),
        ("shop", "Space"),
        ("store", "Space"),
    ]
    .into_iter()
    .collect()
});

/// Resolve user input to one of the `known` remote type names.
///
/// Accepts any casing, a trailing plural `s`, and the node type form
/// (`NacelleProduct` for prefix `Nacelle`).
///
/// # Errors
///
/// Returns `UnknownType` with the closest known name as suggestion.
pub fn resolve_type_name(input: &str, known: &[&str], type_prefix: &str) -> Result<String> {
    let lower = input.trim().to_lowercase();
    let unprefixed = lower
        .strip_prefix(&type_prefix.to_lowercase())
        .filter(|rest| !rest.is_empty())
        .unwrap_or(&lower);
    let singular = unprefixed.strip_suffix('s').unwrap_or(unprefixed);

    // Tier 1: exact match
    for candidate in [unprefixed, singular] {
        if let Some(name) = known.iter().find(|k| k.to_lowercase() == candidate) {
            return Ok((*name).to_string());
        }
    }

    // Tier 2: synonym lookup
    for candidate in [unprefixed, singular] {
        if let Some(&canonical) = TYPE_SYNONYMS.get(candidate) {
            if known.contains(&canonical) {
                return Ok(canonical.to_string());
            }
        }
    }

    // Tier 3: closest suggestion
    Err(Error::UnknownType {
        name: input.to_string(),
        suggestion: find_closest_type(singular, known),
    })
}

/// Find the closest known type within edit distance 3.
fn find_closest_type(input: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|name| (levenshtein_distance(input, &name.to_lowercase()), *name))
        .filter(|(dist, _)| *dist <= 3)
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, name)| name.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row optimization
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find stored node ids similar to the searched one.
///
/// Returns up to `max` suggestions with edit distance ≤ 3,
/// sorted by distance then alphabetically.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}
