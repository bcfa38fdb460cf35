//! Text normalization and token-overlap similarity
//!
//! Shared by intended-use overlap checks (lineage) and TEXTUAL / NOVEL_CLAIM
//! dimension comparisons (gap detection). Similarity is computed over
//! normalized, deduplicated tokens with `similar`, so it is insensitive to
//! word order, case, and punctuation.

use similar::{DiffTag, TextDiff};
use std::collections::BTreeSet;

/// Lowercase, strip punctuation, split on whitespace, drop empties
pub fn normalize_tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Token-overlap similarity in [0.0, 1.0]
///
/// Dice coefficient over the normalized token sets: 1.0 for identical token
/// sets, 0.0 for disjoint ones. Two empty texts compare as identical.
pub fn token_similarity(a: &str, b: &str) -> f64 {
    let set_a = normalize_tokens(a);
    let set_b = normalize_tokens(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let tokens_a: Vec<&str> = set_a.iter().map(String::as_str).collect();
    let tokens_b: Vec<&str> = set_b.iter().map(String::as_str).collect();

    // Both sides are sorted (BTreeSet order), so the diff ratio reduces to
    // 2*|common| / (|a| + |b|) over token sets. Computed in f64 because
    // `TextDiff::ratio()` returns f32, whose rounding breaks exact values
    // like 0.8.
    let diff = TextDiff::from_slices(&tokens_a, &tokens_b);
    let common: usize = diff
        .ops()
        .iter()
        .filter(|op| op.tag() == DiffTag::Equal)
        .map(|op| op.old_range().len())
        .sum();
    (2.0 * common as f64) / ((tokens_a.len() + tokens_b.len()) as f64)
}

/// Tokens present in `a` but not in `b`, and vice versa
pub fn token_differences(a: &str, b: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let tokens_a = normalize_tokens(a);
    let tokens_b = normalize_tokens(b);
    let a_only = tokens_a.difference(&tokens_b).cloned().collect();
    let b_only = tokens_b.difference(&tokens_a).cloned().collect();
    (a_only, b_only)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_similarity_one() {
        assert_eq!(token_similarity("bone fixation screw", "bone fixation screw"), 1.0);
    }

    #[test]
    fn test_similarity_ignores_case_order_punctuation() {
        assert_eq!(
            token_similarity("Fixation, of bone.", "bone of fixation"),
            1.0
        );
    }

    #[test]
    fn test_disjoint_texts_similarity_zero() {
        assert_eq!(token_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {a, b} vs {a, c}: 2*1 / (2+2) = 0.5
        let sim = token_similarity("alpha beta", "alpha gamma");
        assert!((sim - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_unequal_token_counts() {
        // {alpha, beta, gamma} vs {alpha, beta}: 2*2 / (3+2) = 0.8
        let sim = token_similarity("alpha beta gamma", "beta alpha");
        assert!((sim - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_token_differences() {
        let (a_only, b_only) = token_differences("screw plate", "screw rod");
        assert_eq!(a_only.into_iter().collect::<Vec<_>>(), vec!["plate"]);
        assert_eq!(b_only.into_iter().collect::<Vec<_>>(), vec!["rod"]);
    }

    #[test]
    fn test_empty_both_identical() {
        assert_eq!(token_similarity("", ""), 1.0);
        assert_eq!(token_similarity("", "something"), 0.0);
    }
}
