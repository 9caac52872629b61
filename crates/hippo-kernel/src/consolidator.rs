//! Consolidator: turns raw session log entries into session-summary records.
//!
//! The cursor lives in the store and moves in the same transaction as the
//! records it produced, so an entry is consumed at most once even when the
//! process dies mid-run.

use crate::cancel::CancelFlag;
use chrono::{DateTime, NaiveDate, Utc};
use hippo_memory::MemoryStore;
use hippo_runtime::extract::extract_json_object;
use hippo_runtime::prompts::consolidation_prompt;
use hippo_runtime::{Generator, SessionCursor, SessionEntry, SessionSource};
use hippo_types::config::ConsolidationConfig;
use hippo_types::delta::StateDelta;
use hippo_types::error::HippoResult;
use hippo_types::record::{MemoryRecord, RecordId, SESSION_SUMMARY};
use hippo_types::report::BatchReport;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Store cursor counting consumed session entries.
pub const SESSION_CURSOR: &str = "consolidation.session";

/// Value written to `metadata.source` on consolidated records.
pub const SOURCE_TAG: &str = "hippo-consolidate";

/// One handled entry.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedEntry {
    pub heading: String,
    pub delta: StateDelta,
    /// `None` in a dry run.
    pub record_id: Option<RecordId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationReport {
    #[serde(flatten)]
    pub batch: BatchReport,
    pub entries: Vec<ConsolidatedEntry>,
    pub cursor_before: u64,
    pub cursor_after: u64,
}

pub struct Consolidator {
    store: MemoryStore,
    generator: Arc<dyn Generator>,
    config: ConsolidationConfig,
    cancel: CancelFlag,
}

impl Consolidator {
    pub fn new(
        store: MemoryStore,
        generator: Arc<dyn Generator>,
        config: ConsolidationConfig,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            cancel,
        }
    }

    /// Consolidate up to `max_entries_per_run` unconsumed entries from `source`.
    ///
    /// An unreachable generator stops the run without moving the cursor past
    /// the failing entry. An unreadable response or an empty summary consumes
    /// the entry with no record.
    pub async fn run(
        &self,
        source: &dyn SessionSource,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> HippoResult<ConsolidationReport> {
        let start = self.store.get_position(SESSION_CURSOR)?;
        let mut cursor = SessionCursor::new(start);
        let mut report = ConsolidationReport {
            batch: BatchReport::new(dry_run),
            entries: Vec::new(),
            cursor_before: start,
            cursor_after: start,
        };
        info!(
            cursor = start,
            available = source.len(),
            dry_run,
            backend = self.generator.name(),
            "Consolidation started"
        );

        while report.entries.len() + report.batch.failed + report.batch.skipped
            < self.config.max_entries_per_run
        {
            if self.cancel.is_cancelled() {
                report.batch.cancelled = true;
                break;
            }
            let Some((entry, next)) = source.next_unconsolidated_entry(cursor)? else {
                break;
            };

            let prompt = consolidation_prompt(&entry.text);
            let response = match self
                .generator
                .generate(&prompt, self.config.max_tokens, self.config.temperature)
                .await
            {
                Ok(text) => text,
                Err(e) if e.is_recoverable_inference() => {
                    warn!(entry = %entry.heading, error = %e, "Generator unavailable, stopping before this entry");
                    report.batch.skipped += 1;
                    break;
                }
                Err(e) => return Err(e),
            };

            let Some(value) = extract_json_object(&response) else {
                warn!(entry = %entry.heading, "No JSON object in consolidation response");
                report.batch.failed += 1;
                self.advance(&[], next, dry_run)?;
                cursor = next;
                continue;
            };

            let delta = StateDelta::from_json(&value);
            if delta.is_empty() {
                debug!(entry = %entry.heading, "Empty summary, nothing stored");
                report.batch.skipped += 1;
                self.advance(&[], next, dry_run)?;
                cursor = next;
                continue;
            }

            let record = summary_record(&entry, &delta, now);
            let record_id = if dry_run {
                None
            } else {
                let ids = self.advance(std::slice::from_ref(&record), next, dry_run)?;
                ids.into_iter().next()
            };
            info!(
                entry = %entry.heading,
                id = %record.id.short(),
                entities = delta.entities.all.len(),
                open_threads = delta.open_threads.len(),
                dry_run,
                "Session consolidated"
            );
            report.batch.processed += 1;
            report.entries.push(ConsolidatedEntry {
                heading: entry.heading.clone(),
                delta,
                record_id,
            });
            cursor = next;
        }

        report.cursor_after = cursor.position;
        info!(
            processed = report.batch.processed,
            skipped = report.batch.skipped,
            failed = report.batch.failed,
            cursor = cursor.position,
            "Consolidation finished"
        );
        Ok(report)
    }

    fn advance(
        &self,
        records: &[MemoryRecord],
        next: SessionCursor,
        dry_run: bool,
    ) -> HippoResult<Vec<RecordId>> {
        if dry_run {
            return Ok(Vec::new());
        }
        self.store.store_with_cursor(records, SESSION_CURSOR, next.position)
    }
}

/// Build the session-summary record for a delta.
pub fn summary_record(entry: &SessionEntry, delta: &StateDelta, now: DateTime<Utc>) -> MemoryRecord {
    let mut record = MemoryRecord::new(delta.summary.clone(), SESSION_SUMMARY, now)
        .with_tags(&delta.entities.all)
        .with_metadata("entities", json!(delta.entities.all))
        .with_metadata("people", json!(delta.entities.people))
        .with_metadata("open_threads", json!(delta.open_threads))
        .with_metadata("security_flags", json!(delta.security_flags))
        .with_metadata("emotional_signals", json!(delta.emotional_signals))
        .with_metadata("source", json!(SOURCE_TAG))
        .with_metadata("session_heading", json!(entry.heading));
    if let Some(date) = heading_date(&entry.heading) {
        record = record.with_metadata("session_date", json!(date.to_string()));
    }
    record
}

/// A leading `YYYY-MM-DD` in a session heading.
fn heading_date(heading: &str) -> Option<NaiveDate> {
    let prefix = heading.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
