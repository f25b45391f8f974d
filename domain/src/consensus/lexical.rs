//! Deterministic lexical similarity
//!
//! Term-frequency vector cosine over word tokens. This is the degraded mode
//! of semantic similarity measurement and the offline metric used by
//! fallback synthesis; it must stay dependency-free and deterministic.

use std::collections::HashMap;

/// Cosine similarity of the two texts' term-frequency vectors, in [0, 1]
///
/// Symmetric. Two empty texts count as identical (1.0); one empty text
/// shares nothing with a non-empty one (0.0).
pub fn term_frequency_cosine(text1: &str, text2: &str) -> f64 {
    let a = term_frequencies(text1);
    let b = term_frequencies(text2);

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .filter_map(|(term, &count)| b.get(term).map(|&other| count as f64 * other as f64))
        .sum();
    let norm_a: f64 = a.values().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt();

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Tokenize into lowercase word counts, dropping single-character tokens
fn term_frequencies(text: &str) -> HashMap<String, u32> {
    let mut frequencies = HashMap::new();
    for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if token.len() < 2 {
            continue;
        }
        *frequencies.entry(token.to_string()).or_insert(0) += 1;
    }
    frequencies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_score_one() {
        let text = "Use a write-through cache with a short TTL";
        assert!((term_frequency_cosine(text, text) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        assert_eq!(term_frequency_cosine("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = "prefer eventual consistency for the session store";
        let b = "the session store should be strongly consistent";
        assert_eq!(
            term_frequency_cosine(a, b),
            term_frequency_cosine(b, a)
        );
    }

    #[test]
    fn test_partial_overlap_is_between_bounds() {
        let score = term_frequency_cosine("cache the result", "cache the query plan");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn test_empty_handling() {
        assert_eq!(term_frequency_cosine("", ""), 1.0);
        assert_eq!(term_frequency_cosine("", "something"), 0.0);
        // Only single-character tokens is effectively empty
        assert_eq!(term_frequency_cosine("a b c", "a b c"), 1.0);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let score = term_frequency_cosine("Cache, the result!", "cache the result");
        assert!((score - 1.0).abs() < 1e-9);
    }
}
