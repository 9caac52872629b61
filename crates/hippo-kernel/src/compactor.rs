//! Compactor: pairwise dedup, supersession and relation discovery.
//!
//! A run has three phases. Candidate pairs are found by Jaccard token overlap
//! over active records, skipping pairs whose content version is already in
//! the visited-set. Candidates at or above the threshold are classified by a
//! bounded worker pool. Verdicts are then applied in pair-key order, so the
//! outcome never depends on which classification finished first.
//!
//! Above `full_scan_limit` active records a run only looks at pairs touching
//! a record changed since the last run, plus the pairs the last run left
//! unfinished (deferred, unavailable, failed or cancelled).

use crate::cancel::CancelFlag;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use hippo_memory::text::{jaccard, tokenize};
use hippo_memory::{MemoryStore, StoreChange, VisitedPair};
use hippo_runtime::Classifier;
use hippo_types::config::CompactionConfig;
use hippo_types::error::{HippoError, HippoResult};
use hippo_types::inference::{Classification, Relationship};
use hippo_types::lineage::{content_version, pair_key, EdgeKind};
use hippo_types::record::{merge_tags, MemoryRecord, RecordId, RecordStatus};
use hippo_types::report::BatchReport;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cursor holding the RFC3339 time of the last live run.
pub const LAST_RUN_CURSOR: &str = "compaction.last_run";

/// Cursor holding a JSON array of pair keys the last live run left unfinished.
pub const PENDING_CURSOR: &str = "compaction.pending";

/// What a decision did (or, in a dry run, would do).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Duplicate: `retired` was folded into `survivor`.
    Merge { survivor: RecordId, retired: RecordId },
    /// `older` was replaced by `newer`.
    Supersede { newer: RecordId, older: RecordId },
    /// A `related` edge between the two.
    Relate { from: RecordId, to: RecordId },
    /// Both sources were folded into a new record.
    MergeInto { new_id: RecordId, sources: Vec<RecordId> },
    /// No mutation beyond the visited marker.
    Keep,
}

/// One classified pair and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CompactionAction {
    pub a: RecordId,
    pub b: RecordId,
    pub similarity: f64,
    pub relationship: Relationship,
    pub outcome: ActionOutcome,
    /// The classifier's answer was unreadable and `distinct` was assumed.
    pub malformed: bool,
    pub rationale: Option<String>,
}

/// Result of one compaction run.
#[derive(Debug, Clone, Serialize)]
pub struct CompactionReport {
    #[serde(flatten)]
    pub batch: BatchReport,
    /// Pairs whose overlap was computed.
    pub compared: usize,
    /// Pairs at or above the threshold.
    pub candidates: usize,
    /// Candidates left for a later run by `max_pairs_per_run`.
    pub deferred: usize,
    /// Only records changed since the last run and pending pairs were considered.
    pub windowed: bool,
    /// Pairs left unfinished and queued for the next run.
    pub pending: usize,
    pub actions: Vec<CompactionAction>,
}

impl CompactionReport {
    fn new(dry_run: bool) -> Self {
        Self {
            batch: BatchReport::new(dry_run),
            compared: 0,
            candidates: 0,
            deferred: 0,
            windowed: false,
            pending: 0,
            actions: Vec::new(),
        }
    }
}

/// A pair at or above the threshold. `a.id < b.id`.
#[derive(Debug, Clone)]
struct Candidate {
    a: MemoryRecord,
    b: MemoryRecord,
    similarity: f64,
    key: String,
    version: String,
}

/// The compaction engine.
pub struct Compactor {
    store: MemoryStore,
    classifier: Arc<dyn Classifier>,
    config: CompactionConfig,
    cancel: CancelFlag,
}

impl Compactor {
    pub fn new(
        store: MemoryStore,
        classifier: Arc<dyn Classifier>,
        config: CompactionConfig,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            store,
            classifier,
            config,
            cancel,
        }
    }

    /// Run one compaction pass. `threshold` overrides the configured one.
    pub async fn run(
        &self,
        dry_run: bool,
        threshold: Option<f64>,
        now: DateTime<Utc>,
    ) -> HippoResult<CompactionReport> {
        let threshold = threshold.unwrap_or(self.config.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(HippoError::ConfigInvalid(format!(
                "compaction threshold must be within [0, 1], got {threshold}"
            )));
        }

        let mut report = CompactionReport::new(dry_run);
        let records = self.store.get_all(false)?;
        let visited = self.store.visited_pairs()?;
        let window = if records.len() > self.config.full_scan_limit {
            match self.last_run()? {
                Some(since) => Some(Window {
                    since,
                    pending: self.pending()?,
                }),
                None => None,
            }
        } else {
            None
        };
        report.windowed = window.is_some();

        let (mut candidates, compared) = find_candidates(&records, &visited, window.as_ref(), threshold);
        report.compared = compared;
        report.candidates = candidates.len();
        candidates.sort_by(|x, y| x.key.cmp(&y.key));
        let mut unfinished: Vec<String> = Vec::new();
        if candidates.len() > self.config.max_pairs_per_run {
            report.deferred = candidates.len() - self.config.max_pairs_per_run;
            unfinished.extend(
                candidates
                    .drain(self.config.max_pairs_per_run..)
                    .map(|c| c.key),
            );
        }
        info!(
            active = records.len(),
            compared,
            candidates = report.candidates,
            deferred = report.deferred,
            windowed = report.windowed,
            threshold,
            dry_run,
            "Compaction started"
        );

        let mut classified = self.classify_all(candidates).await;
        classified.sort_by(|x, y| x.0.key.cmp(&y.0.key));

        let mut retired: HashSet<RecordId> = HashSet::new();
        let mut tag_state: HashMap<RecordId, Vec<String>> = HashMap::new();

        for (cand, result) in classified {
            let Some(result) = result else {
                report.batch.cancelled = true;
                unfinished.push(cand.key);
                continue;
            };
            let (classification, malformed) = match result {
                Ok(c) => (c, false),
                Err(HippoError::InferenceMalformedResponse(reason)) => {
                    warn!(pair = %short_key(&cand), %reason, "Malformed classification, treating as distinct");
                    (Classification::distinct(), true)
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e @ HippoError::InferenceUnavailable(_)) => {
                    warn!(pair = %short_key(&cand), error = %e, "Classifier unavailable, pair skipped");
                    report.batch.skipped += 1;
                    unfinished.push(cand.key);
                    continue;
                }
                Err(e) => {
                    warn!(pair = %short_key(&cand), error = %e, "Classification failed");
                    report.batch.failed += 1;
                    unfinished.push(cand.key);
                    continue;
                }
            };

            if retired.contains(&cand.a.id) || retired.contains(&cand.b.id) {
                debug!(pair = %short_key(&cand), "Pair touches a record retired earlier in this run");
                report.batch.skipped += 1;
                continue;
            }

            let (outcome, mut change) = decide(&cand, &classification, &tag_state, now);
            change.visited.push(VisitedPair {
                pair_key: cand.key.clone(),
                content_version: cand.version.clone(),
                verdict: classification.label.as_str().to_string(),
                visited_at: now,
            });

            if !dry_run {
                if let Err(e) = self.store.apply_change(&change, now) {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(pair = %short_key(&cand), error = %e, "Failed to apply compaction decision");
                    report.batch.failed += 1;
                    unfinished.push(cand.key);
                    continue;
                }
            }

            for (id, status) in &change.status_changes {
                if !status.is_active() {
                    retired.insert(id.clone());
                }
            }
            for (id, tags) in change.tag_updates {
                tag_state.insert(id, tags);
            }
            debug!(
                pair = %short_key(&cand),
                label = %classification.label,
                outcome = ?outcome,
                "Pair decided"
            );
            report.batch.processed += 1;
            report.actions.push(CompactionAction {
                a: cand.a.id.clone(),
                b: cand.b.id.clone(),
                similarity: cand.similarity,
                relationship: classification.label,
                outcome,
                malformed,
                rationale: classification.rationale.clone(),
            });
        }

        unfinished.sort();
        unfinished.dedup();
        report.pending = unfinished.len();
        if !dry_run {
            let pending = serde_json::to_string(&unfinished)
                .map_err(|e| HippoError::Serialization(e.to_string()))?;
            let last_run = now.to_rfc3339();
            self.store.set_cursors(&[
                (LAST_RUN_CURSOR, last_run.as_str()),
                (PENDING_CURSOR, pending.as_str()),
            ])?;
        }

        info!(
            processed = report.batch.processed,
            skipped = report.batch.skipped,
            failed = report.batch.failed,
            cancelled = report.batch.cancelled,
            pending = report.pending,
            dry_run,
            "Compaction finished"
        );
        Ok(report)
    }

    fn last_run(&self) -> HippoResult<Option<DateTime<Utc>>> {
        match self.store.get_cursor(LAST_RUN_CURSOR)? {
            Some(value) => DateTime::parse_from_rfc3339(&value)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| {
                    HippoError::StorageCorrupt(format!("cursor '{LAST_RUN_CURSOR}' = '{value}': {e}"))
                }),
            None => Ok(None),
        }
    }

    fn pending(&self) -> HippoResult<HashSet<String>> {
        match self.store.get_cursor(PENDING_CURSOR)? {
            Some(value) => serde_json::from_str(&value).map_err(|e| {
                HippoError::StorageCorrupt(format!("cursor '{PENDING_CURSOR}' = '{value}': {e}"))
            }),
            None => Ok(HashSet::new()),
        }
    }

    /// Classify candidates with at most `workers` calls in flight. A `None`
    /// result means cancellation stopped the pair before it started.
    async fn classify_all(
        &self,
        candidates: Vec<Candidate>,
    ) -> Vec<(Candidate, Option<HippoResult<Classification>>)> {
        let workers = self.config.workers.max(1);
        stream::iter(candidates)
            .map(|cand| {
                let classifier = Arc::clone(&self.classifier);
                let cancel = self.cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (cand, None);
                    }
                    let result = classifier.classify(&cand.a, &cand.b).await;
                    (cand, Some(result))
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await
    }
}

fn short_key(cand: &Candidate) -> String {
    format!("{}:{}", cand.a.id.short(), cand.b.id.short())
}

/// Scope of a windowed run.
struct Window {
    since: DateTime<Utc>,
    pending: HashSet<String>,
}

/// Pairs at or above `threshold`, and how many pairs were compared.
fn find_candidates(
    records: &[MemoryRecord],
    visited: &HashMap<String, VisitedPair>,
    window: Option<&Window>,
    threshold: f64,
) -> (Vec<Candidate>, usize) {
    let tokens: Vec<_> = records.iter().map(|r| tokenize(&r.content)).collect();
    let changed = |r: &MemoryRecord| window.map_or(true, |w| r.updated_at >= w.since);
    let mut out = Vec::new();
    let mut compared = 0;

    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            let (ri, rj) = (&records[i], &records[j]);
            if ri.id == rj.id {
                continue;
            }
            let key = pair_key(&ri.id, &rj.id);
            let in_scope = changed(ri)
                || changed(rj)
                || window.is_some_and(|w| w.pending.contains(&key));
            if !in_scope {
                continue;
            }
            let version = content_version(ri, rj);
            if visited.get(&key).is_some_and(|v| v.content_version == version) {
                continue;
            }
            compared += 1;
            let similarity = jaccard(&tokens[i], &tokens[j]);
            if similarity < threshold {
                continue;
            }
            let (a, b) = if ri.id < rj.id { (ri, rj) } else { (rj, ri) };
            out.push(Candidate {
                a: a.clone(),
                b: b.clone(),
                similarity,
                key,
                version,
            });
        }
    }
    (out, compared)
}

/// Older by creation time, then smaller id.
fn older_first<'a>(a: &'a MemoryRecord, b: &'a MemoryRecord) -> (&'a MemoryRecord, &'a MemoryRecord) {
    if (a.created_at, &a.id) <= (b.created_at, &b.id) {
        (a, b)
    } else {
        (b, a)
    }
}

/// Duplicate survivor: longer content, then older, then smaller id.
fn survivor_of<'a>(a: &'a MemoryRecord, b: &'a MemoryRecord) -> (&'a MemoryRecord, &'a MemoryRecord) {
    match a.content_len().cmp(&b.content_len()) {
        std::cmp::Ordering::Greater => (a, b),
        std::cmp::Ordering::Less => (b, a),
        std::cmp::Ordering::Equal => older_first(a, b),
    }
}

/// Turn a verdict into store mutations. Pure.
fn decide(
    cand: &Candidate,
    classification: &Classification,
    tag_state: &HashMap<RecordId, Vec<String>>,
    now: DateTime<Utc>,
) -> (ActionOutcome, StoreChange) {
    let (a, b) = (&cand.a, &cand.b);
    let current_tags = |r: &MemoryRecord| tag_state.get(&r.id).cloned().unwrap_or_else(|| r.tags.clone());
    let mut change = StoreChange::default();

    if let (Some(hint), true) = (&classification.merge, classification.label != Relationship::Distinct) {
        let (older, newer) = older_first(a, b);
        let longest = a.content_len().max(b.content_len());
        let content = hint
            .merged_content
            .as_deref()
            .map(str::trim)
            .filter(|m| m.chars().count() >= longest)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}\n{}", older.content, newer.content));
        let merged = MemoryRecord::new(content, older.category.clone(), now)
            .with_tags(merge_tags(&current_tags(older), &current_tags(newer)))
            .decay_exempt(a.decay_exempt || b.decay_exempt)
            .with_metadata("merged_from", serde_json::json!([older.id, newer.id]));

        if merged.id != a.id && merged.id != b.id {
            let new_id = merged.id.clone();
            change.new_records.push(merged);
            for source in [older, newer] {
                change.status_changes.push((source.id.clone(), RecordStatus::Merged));
                change.edges.push((source.id.clone(), new_id.clone(), EdgeKind::MergedFrom));
            }
            let outcome = ActionOutcome::MergeInto {
                new_id,
                sources: vec![older.id.clone(), newer.id.clone()],
            };
            return (outcome, change);
        }
        return fold_duplicate(a, b, &current_tags, change);
    }

    match classification.label {
        Relationship::Duplicate => fold_duplicate(a, b, &current_tags, change),
        Relationship::Superseded => {
            if a.created_at == b.created_at {
                return (ActionOutcome::Keep, change);
            }
            let (older, newer) = older_first(a, b);
            change.status_changes.push((older.id.clone(), RecordStatus::Superseded));
            change.edges.push((newer.id.clone(), older.id.clone(), EdgeKind::Supersedes));
            let outcome = ActionOutcome::Supersede {
                newer: newer.id.clone(),
                older: older.id.clone(),
            };
            (outcome, change)
        }
        Relationship::Related => {
            change.edges.push((a.id.clone(), b.id.clone(), EdgeKind::Related));
            let outcome = ActionOutcome::Relate {
                from: a.id.clone(),
                to: b.id.clone(),
            };
            (outcome, change)
        }
        Relationship::Distinct => (ActionOutcome::Keep, change),
    }
}

fn fold_duplicate(
    a: &MemoryRecord,
    b: &MemoryRecord,
    current_tags: &dyn Fn(&MemoryRecord) -> Vec<String>,
    mut change: StoreChange,
) -> (ActionOutcome, StoreChange) {
    let (survivor, retired) = survivor_of(a, b);
    let survivor_tags = current_tags(survivor);
    let absorbed = merge_tags(&survivor_tags, &current_tags(retired));
    if absorbed.len() != survivor_tags.len() {
        change.tag_updates.push((survivor.id.clone(), absorbed));
    }
    change.status_changes.push((retired.id.clone(), RecordStatus::Merged));
    change.edges.push((survivor.id.clone(), retired.id.clone(), EdgeKind::MergedFrom));
    let outcome = ActionOutcome::Merge {
        survivor: survivor.id.clone(),
        retired: retired.id.clone(),
    };
    (outcome, change)
}
