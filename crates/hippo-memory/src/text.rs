//! Token sets and Jaccard overlap, the cheap pre-filter used before any
//! classification call.

use std::collections::HashSet;

/// Lowercased whitespace tokens with surrounding punctuation trimmed.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `|A ∩ B| / |A ∪ B|` over token sets. Two empty sets score 0.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Jaccard overlap of two texts.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard(&tokenize(a), &tokenize(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation_and_case() {
        let tokens = tokenize("Switched to Postgres, finally! (v16)");
        assert!(tokens.contains("postgres"));
        assert!(tokens.contains("finally"));
        assert!(tokens.contains("v16"));
        assert_eq!(tokens.len(), 5);
    }

    #[test]
    fn test_jaccard_bounds() {
        assert_eq!(text_similarity("a b c", "a b c"), 1.0);
        assert_eq!(text_similarity("a b", "c d"), 0.0);
        assert_eq!(text_similarity("", ""), 0.0);
        assert_eq!(text_similarity("a", ""), 0.0);
    }

    #[test]
    fn test_jaccard_value() {
        // {the, db, is, postgres} vs {the, db, is, now, postgres, 16}: 4 / 6
        let s = text_similarity("the db is postgres", "the DB is now Postgres 16");
        assert!((s - 4.0 / 6.0).abs() < 1e-9);
    }
}
