//! Fuzzy text similarity for the duplicate filter.
//!
//! Token-set scoring: order and repetition of words don't matter, so a
//! repost with reshuffled hashtags or a trimmed tail still scores high
//! against the original. Scores are 0–100; the pipeline treats anything
//! strictly above the configured threshold (default 92) as a duplicate.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// Similarity score above which two posts count as the same posting.
pub const DEFAULT_SIMILARITY_THRESHOLD: u8 = 92;

/// Computes the token-set ratio between two texts, scaled to 0–100.
///
/// Both texts are split on whitespace into token sets, compared
/// case-sensitively (`token_set_ratio_ci` lowercases first).
/// The score is the best normalized-Levenshtein ratio among the sorted
/// intersection string and each side's intersection+remainder string,
/// which makes the measure insensitive to word order and duplication.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let intersection: BTreeSet<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: BTreeSet<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: BTreeSet<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let joined_int = join(&intersection);
    let joined_a = join_with_rest(&joined_int, &only_a);
    let joined_b = join_with_rest(&joined_int, &only_b);

    let best = ratio(&joined_int, &joined_a)
        .max(ratio(&joined_int, &joined_b))
        .max(ratio(&joined_a, &joined_b));

    (best * 100.0).round() as u8
}

/// Returns true when the two texts exceed the duplicate threshold.
pub fn is_similar(a: &str, b: &str, threshold: u8) -> bool {
    token_set_ratio(a, b) > threshold
}

// Case-sensitive; callers wanting case-insensitive scoring lowercase first
// (see `token_set_ratio_ci`).
fn tokenize(text: &str) -> BTreeSet<&str> {
    text.split_whitespace().collect()
}

fn join(tokens: &BTreeSet<&str>) -> String {
    tokens.iter().copied().collect::<Vec<_>>().join(" ")
}

fn join_with_rest(base: &str, rest: &BTreeSet<&str>) -> String {
    if rest.is_empty() {
        return base.to_string();
    }
    let rest_joined = join(rest);
    if base.is_empty() {
        rest_joined
    } else {
        format!("{} {}", base, rest_joined)
    }
}

fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

/// Case-insensitive wrapper: lowercases both inputs before scoring.
pub fn token_set_ratio_ci(a: &str, b: &str) -> u8 {
    token_set_ratio(&a.to_lowercase(), &b.to_lowercase())
}
