//! Lineage edges: the append-only audit graph written by compaction.

use crate::record::{normalize_content, MemoryRecord, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Why two records are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// `from` replaces the older `to`.
    Supersedes,
    /// Same topic, distinct information.
    Related,
    /// Content of one side was folded into the other.
    MergedFrom,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Supersedes => "supersedes",
            EdgeKind::Related => "related",
            EdgeKind::MergedFrom => "merged-from",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supersedes" => Ok(EdgeKind::Supersedes),
            "related" => Ok(EdgeKind::Related),
            "merged-from" => Ok(EdgeKind::MergedFrom),
            other => Err(format!("unknown edge kind '{other}'")),
        }
    }
}

/// A directed, immutable relation between two records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub from_id: RecordId,
    pub to_id: RecordId,
    pub kind: EdgeKind,
    pub created_at: DateTime<Utc>,
}

impl LineageEdge {
    pub fn new(from_id: RecordId, to_id: RecordId, kind: EdgeKind, now: DateTime<Utc>) -> Self {
        Self {
            from_id,
            to_id,
            kind,
            created_at: now,
        }
    }
}

/// Unordered pair key used by the visited-set: `min_id:max_id`.
pub fn pair_key(a: &RecordId, b: &RecordId) -> String {
    if a <= b {
        format!("{}:{}", a.0, b.0)
    } else {
        format!("{}:{}", b.0, a.0)
    }
}

/// Version marker of a pair's content: hex SHA-256 (first 16 chars) over both
/// normalized contents in pair-key order. A visited pair is judged again only
/// when this changes.
pub fn content_version(a: &MemoryRecord, b: &MemoryRecord) -> String {
    let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(normalize_content(&first.content).as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_content(&second.content).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_names() {
        assert_eq!(EdgeKind::MergedFrom.as_str(), "merged-from");
        assert_eq!(
            serde_json::to_string(&EdgeKind::MergedFrom).unwrap(),
            "\"merged-from\""
        );
        assert_eq!("supersedes".parse::<EdgeKind>(), Ok(EdgeKind::Supersedes));
        assert!("parent".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn test_pair_key_unordered() {
        let a = RecordId("aaa".into());
        let b = RecordId("bbb".into());
        assert_eq!(pair_key(&a, &b), pair_key(&b, &a));
        assert_eq!(pair_key(&a, &b), "aaa:bbb");
    }

    #[test]
    fn test_content_version_symmetric() {
        let now = Utc::now();
        let a = MemoryRecord::new("the db is postgres", "note", now);
        let b = MemoryRecord::new("the db is mysql", "note", now);
        let c = MemoryRecord::new("something else", "note", now);
        assert_eq!(content_version(&a, &b), content_version(&b, &a));
        assert_ne!(content_version(&a, &b), content_version(&a, &c));
        assert_eq!(content_version(&a, &b).len(), 16);
    }
}
