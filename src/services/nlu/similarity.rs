//! Fuzzy string similarity, selected once at startup.

use std::collections::BTreeSet;

/// Scores how close a user message is to a catalog name, on a 0–100 scale.
pub trait StringSimilarity: Send + Sync {
    fn score(&self, query: &str, choice: &str) -> f64;

    /// Minimum score for a single confident match.
    fn accept_threshold(&self) -> f64;

    fn name(&self) -> &'static str;
}

/// Token-set ratio: compares the shared tokens against each side's remainder,
/// so a short name fully contained in a long message still scores high.
pub struct TokenSetSimilarity;

impl StringSimilarity for TokenSetSimilarity {
    fn score(&self, query: &str, choice: &str) -> f64 {
        token_set_ratio(query, choice)
    }

    fn accept_threshold(&self) -> f64 {
        75.0
    }

    fn name(&self) -> &'static str {
        "token_set"
    }
}

/// Whole-string edit-distance ratio. Cheaper and stricter about extra words.
pub struct SequenceSimilarity;

impl StringSimilarity for SequenceSimilarity {
    fn score(&self, query: &str, choice: &str) -> f64 {
        strsim::normalized_levenshtein(query, choice) * 100.0
    }

    fn accept_threshold(&self) -> f64 {
        60.0
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

pub fn from_config(backend: &str) -> Box<dyn StringSimilarity> {
    match backend {
        "simple" | "sequence" => Box::new(SequenceSimilarity),
        _ => Box::new(TokenSetSimilarity),
    }
}

fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = ta.intersection(&tb).copied().collect();
    let only_a: Vec<&str> = ta.difference(&tb).copied().collect();
    let only_b: Vec<&str> = tb.difference(&ta).copied().collect();

    let base = common.join(" ");
    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let join = |rest: &[&str]| {
        if base.is_empty() {
            rest.join(" ")
        } else {
            format!("{base} {}", rest.join(" "))
        }
    };
    let with_a = join(&only_a);
    let with_b = join(&only_b);

    let mut best = ratio(&with_a, &with_b);
    if !base.is_empty() {
        best = best.max(ratio(&base, &with_a)).max(ratio(&base, &with_b));
    }
    best
}
