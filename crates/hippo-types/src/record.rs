//! Memory records: identifiers, lifecycle status, and tag handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Category assigned to records produced from session logs.
pub const SESSION_SUMMARY: &str = "session-summary";

/// Default category for records stored without one.
pub const DEFAULT_CATEGORY: &str = "note";

/// Stable identifier of a record: hex SHA-256 of its normalized content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Derive the id for a piece of content.
    pub fn for_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_content(content).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// First 12 hex characters, for log lines and terminal output.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalize content for identity: lowercase, whitespace collapsed, trimmed.
pub fn normalize_content(content: &str) -> String {
    content
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lifecycle status. Records never leave the store; retirement is a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Visible to listing, search and scoring.
    Active,
    /// Folded into another record by compaction.
    Merged,
    /// Replaced by a newer record.
    Superseded,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Merged => "merged",
            RecordStatus::Superseded => "superseded",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RecordStatus::Active)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RecordStatus::Active),
            "merged" => Ok(RecordStatus::Merged),
            "superseded" => Ok(RecordStatus::Superseded),
            other => Err(format!("unknown record status '{other}'")),
        }
    }
}

/// A persisted fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Content hash; never changes.
    pub id: RecordId,
    /// The textual content.
    pub content: String,
    /// Case-insensitively unique tags in first-seen casing.
    pub tags: Vec<String>,
    /// Free-form label such as "session-summary".
    pub category: String,
    /// Lifecycle status.
    pub status: RecordStatus,
    /// Curated entries that never decay.
    pub decay_exempt: bool,
    /// Structured side data (entities, open threads, provenance).
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the record was first stored.
    pub created_at: DateTime<Utc>,
    /// Last mutation of tags or status.
    pub updated_at: DateTime<Utc>,
    /// Last time retrieval surfaced this record.
    pub last_accessed_at: DateTime<Utc>,
    /// Number of times retrieval surfaced this record.
    pub access_count: u64,
}

impl MemoryRecord {
    /// Build a new active record. The id is derived from `content`.
    pub fn new(content: impl Into<String>, category: impl Into<String>, now: DateTime<Utc>) -> Self {
        let content = content.into();
        Self {
            id: RecordId::for_content(&content),
            content,
            tags: Vec::new(),
            category: category.into(),
            status: RecordStatus::Active,
            decay_exempt: false,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let incoming: Vec<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
        self.tags = merge_tags(&self.tags, &incoming);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn decay_exempt(mut self, exempt: bool) -> Self {
        self.decay_exempt = exempt;
        self
    }

    /// Content length in characters, the measure used by duplicate resolution.
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Read a list of strings out of the metadata map.
    pub fn metadata_strings(&self, key: &str) -> Vec<String> {
        match self.metadata.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Normalize one tag: trimmed, inner whitespace joined with `-`.
pub fn normalize_tag(tag: &str) -> String {
    tag.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Union `incoming` into `existing`, deduplicating case-insensitively and
/// keeping the first-seen casing. Existing tags keep their order.
pub fn merge_tags(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    for tag in existing.iter().chain(incoming.iter()) {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.to_lowercase()) {
            merged.push(tag);
        }
    }
    merged
}
