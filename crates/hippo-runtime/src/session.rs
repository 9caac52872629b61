//! Session-log sources for consolidation.
//!
//! The session summary log is a markdown file where each session starts with
//! a `## ` heading. Entries are addressed by position; the cursor is the
//! number of entries already consumed, so it only ever grows.

use hippo_types::error::HippoResult;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One unconsolidated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    /// Zero-based position in the log.
    pub index: u64,
    /// Heading text without the `## ` marker, usually a date.
    pub heading: String,
    /// Heading plus body.
    pub text: String,
}

/// Number of entries consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionCursor {
    pub position: u64,
}

impl SessionCursor {
    pub fn new(position: u64) -> Self {
        Self { position }
    }
}

/// Source of raw session text.
pub trait SessionSource: Send + Sync {
    /// The entry at `cursor` and the cursor after it, or `None` when caught up.
    fn next_unconsolidated_entry(
        &self,
        cursor: SessionCursor,
    ) -> HippoResult<Option<(SessionEntry, SessionCursor)>>;

    /// Total entries currently available.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Markdown session log split on `## ` headings.
#[derive(Debug, Clone, Default)]
pub struct MarkdownSessionLog {
    path: Option<PathBuf>,
    entries: Vec<SessionEntry>,
}

impl MarkdownSessionLog {
    /// Read the log at `path`. A missing file is an empty log.
    pub fn open(path: &Path) -> HippoResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "session log not found, treating as empty");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        let mut log = Self::from_text(&text);
        log.path = Some(path.to_path_buf());
        Ok(log)
    }

    /// Parse log text directly.
    pub fn from_text(text: &str) -> Self {
        Self {
            path: None,
            entries: parse_entries(text),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }
}

impl SessionSource for MarkdownSessionLog {
    fn next_unconsolidated_entry(
        &self,
        cursor: SessionCursor,
    ) -> HippoResult<Option<(SessionEntry, SessionCursor)>> {
        let Ok(idx) = usize::try_from(cursor.position) else {
            return Ok(None);
        };
        Ok(self
            .entries
            .get(idx)
            .cloned()
            .map(|entry| (entry, SessionCursor::new(cursor.position + 1))))
    }

    fn len(&self) -> u64 {
        self.entries.len() as u64
    }
}

fn parse_entries(text: &str) -> Vec<SessionEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some((heading, body)) = current.take() {
                push_entry(&mut entries, heading, &body);
            }
            current = Some((heading.trim().to_string(), vec![line]));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((heading, body)) = current {
        push_entry(&mut entries, heading, &body);
    }
    entries
}

fn push_entry(entries: &mut Vec<SessionEntry>, heading: String, lines: &[&str]) {
    entries.push(SessionEntry {
        index: entries.len() as u64,
        heading,
        text: lines.join("\n").trim().to_string(),
    });
}
