//! Classification results returned by the pairwise relationship contract.

use serde::{Deserialize, Serialize};

/// How two records relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Nearly identical information.
    Duplicate,
    /// One updates or replaces the other.
    Superseded,
    /// Same topic, distinct information.
    Related,
    /// Unrelated.
    Distinct,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Duplicate => "duplicate",
            Relationship::Superseded => "superseded",
            Relationship::Related => "related",
            Relationship::Distinct => "distinct",
        }
    }

    /// Parse a label loosely: case-insensitive, surrounding punctuation ignored.
    pub fn parse_label(label: &str) -> Option<Self> {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_lowercase();
        match cleaned.as_str() {
            "duplicate" | "duplicates" | "dup" => Some(Relationship::Duplicate),
            "superseded" | "supersedes" | "supersede" => Some(Relationship::Superseded),
            "related" => Some(Relationship::Related),
            "distinct" | "unrelated" => Some(Relationship::Distinct),
            _ => None,
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classifier's verdict on one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Relationship,
    pub confidence: Option<f32>,
    pub rationale: Option<String>,
    /// Set when the classifier judged both sides complementary and asked for
    /// an explicit merge. May carry the classifier's own merged text.
    pub merge: Option<MergeHint>,
}

/// Explicit-merge signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeHint {
    pub merged_content: Option<String>,
}

impl Classification {
    pub fn new(label: Relationship) -> Self {
        Self {
            label,
            confidence: None,
            rationale: None,
            merge: None,
        }
    }

    /// The safe default applied to malformed responses.
    pub fn distinct() -> Self {
        Self::new(Relationship::Distinct)
    }

    pub fn with_merge(mut self, merged_content: Option<String>) -> Self {
        self.merge = Some(MergeHint { merged_content });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(Relationship::parse_label("Duplicate"), Some(Relationship::Duplicate));
        assert_eq!(Relationship::parse_label(" \"superseded\"."), Some(Relationship::Superseded));
        assert_eq!(Relationship::parse_label("RELATED"), Some(Relationship::Related));
        assert_eq!(Relationship::parse_label("maybe"), None);
    }

    #[test]
    fn test_distinct_default() {
        let c = Classification::distinct();
        assert_eq!(c.label, Relationship::Distinct);
        assert!(c.merge.is_none());
    }
}
