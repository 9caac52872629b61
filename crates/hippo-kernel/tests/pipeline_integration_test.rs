//! Integration tests for the consolidate -> tag -> compact -> predict pipeline.
//!
//! A prompt-routed mock generator stands in for the inference backend and is
//! wired through the real LlmClassifier, kernel and file-backed store. No
//! external services are contacted.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hippo_kernel::{ActionOutcome, HippoKernel};
use hippo_memory::MemoryStore;
use hippo_runtime::{Classifier, Generator, LlmClassifier};
use hippo_types::config::{BackendChoice, HippoConfig};
use hippo_types::error::{HippoError, HippoResult};
use hippo_types::lineage::EdgeKind;
use hippo_types::record::{MemoryRecord, RecordStatus, SESSION_SUMMARY};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Mock generator: answers by prompt kind, counts calls per kind
// ---------------------------------------------------------------------------

const SESSION_LOG: &str = "# Session Summary Log

## 2026-03-01
Decided to switch database to X because Y. Dana will benchmark it.

## 2026-03-02
Drafted the migration runbook with Lee.
";

#[derive(Default)]
struct RoutedGenerator {
    calls: Mutex<HashMap<&'static str, usize>>,
    /// Prompt kinds that report the backend as unreachable.
    offline: Mutex<Vec<&'static str>>,
    /// Relationship the classifier prompt answers with.
    relationship: &'static str,
}

impl RoutedGenerator {
    fn new(relationship: &'static str) -> Arc<Self> {
        Arc::new(Self {
            relationship,
            ..Default::default()
        })
    }

    fn calls(&self, kind: &str) -> usize {
        self.calls.lock().unwrap().get(kind).copied().unwrap_or(0)
    }

    fn set_offline(&self, kind: &'static str) {
        self.offline.lock().unwrap().push(kind);
    }

    fn kind(prompt: &str) -> &'static str {
        if prompt.contains("memory consolidation system") {
            "consolidate"
        } else if prompt.contains("extract entity tags") {
            "tag"
        } else if prompt.contains("memory deduplication system") {
            "classify"
        } else {
            "brief"
        }
    }

    fn consolidation_reply(prompt: &str) -> String {
        if prompt.contains("switch database") {
            r#"Sure! ```json
{"summary": "Decided to switch database to X because Y",
 "entities": {"people": ["Dana"], "tools": ["X"]},
 "open_threads": ["benchmark X"],
 "emotional_signals": "urgency"}
```"#
                .to_string()
        } else {
            r#"{"summary": "Drafted the migration runbook with Lee",
 "entities": {"people": ["Lee"]},
 "open_threads": ["review runbook"]}"#
                .to_string()
        }
    }
}

#[async_trait]
impl Generator for RoutedGenerator {
    async fn generate(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> HippoResult<String> {
        let kind = Self::kind(prompt);
        *self.calls.lock().unwrap().entry(kind).or_insert(0) += 1;
        if self.offline.lock().unwrap().contains(&kind) {
            return Err(HippoError::InferenceUnavailable(format!("{kind} backend down")));
        }
        Ok(match kind {
            "consolidate" => Self::consolidation_reply(prompt),
            "tag" => r#"{"topics": ["migration"], "suggested_tags": []}"#.to_string(),
            "classify" => format!(
                r#"{{"relationship": "{}", "keep": "A", "confidence": 0.9, "reasoning": "same runbook"}}"#,
                self.relationship
            ),
            _ => r#"{"active_context": "Mid-migration to X.", "next_actions": ["benchmark X"]}"#.to_string(),
        })
    }

    fn name(&self) -> &str {
        "routed"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config(dir: &Path) -> HippoConfig {
    let mut config = HippoConfig {
        data_dir: dir.to_path_buf(),
        ..Default::default()
    };
    config.inference.backend = BackendChoice::Offline;
    config
}

fn kernel(dir: &Path, generator: Arc<RoutedGenerator>) -> HippoKernel {
    let config = config(dir);
    std::fs::create_dir_all(config.resolved_session_log().parent().unwrap()).unwrap();
    std::fs::write(config.resolved_session_log(), SESSION_LOG).unwrap();
    let store = MemoryStore::open(&config.resolved_db_path(), &config.storage).unwrap();
    let classifier: Arc<dyn Classifier> = Arc::new(LlmClassifier::new(generator.clone()));
    HippoKernel::from_parts(config, store, generator, classifier).unwrap()
}

fn seed_notes(store: &MemoryStore) -> (MemoryRecord, MemoryRecord) {
    let now = Utc::now();
    let short = MemoryRecord::new("postgres migration runbook for billing", "note", now - Duration::days(3))
        .with_tags(["billing"]);
    let long = MemoryRecord::new(
        "postgres migration runbook for billing service cutover",
        "note",
        now - Duration::days(1),
    );
    store.store(&short).unwrap();
    store.store(&long).unwrap();
    (short, long)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let generator = RoutedGenerator::new("duplicate");
    let kernel = kernel(dir.path(), generator.clone());
    let now = Utc::now();

    // Consolidate
    let log = kernel.session_log(None).unwrap();
    let consolidated = kernel.consolidator().run(&log, false, now).await.unwrap();
    assert_eq!(consolidated.batch.processed, 2);
    let summaries = kernel.store().recent_by_category(SESSION_SUMMARY, 10).unwrap();
    assert_eq!(summaries.len(), 2);
    let switch = summaries
        .iter()
        .find(|s| s.content.contains("switch database"))
        .unwrap();
    assert!(switch.metadata_strings("entities").contains(&"X".to_string()));

    // Tag
    let (short, long) = seed_notes(kernel.store());
    let tagged = kernel.tagger().tag_all().await.unwrap();
    assert_eq!(tagged.batch.processed, 4);
    assert_eq!(generator.calls("tag"), 4);
    assert!(kernel
        .store()
        .search_by_tag("migration")
        .unwrap()
        .iter()
        .any(|r| r.id == long.id));

    // Compact
    let compacted = kernel.compactor().run(false, None, now).await.unwrap();
    assert_eq!(generator.calls("classify"), 1);
    assert_eq!(
        compacted.actions[0].outcome,
        ActionOutcome::Merge {
            survivor: long.id.clone(),
            retired: short.id.clone()
        }
    );
    let survivor = kernel.store().get_by_id(&long.id).unwrap().unwrap();
    assert!(survivor.tags.iter().any(|t| t == "billing"));
    assert_eq!(
        kernel.store().get_by_id(&short.id).unwrap().unwrap().status,
        RecordStatus::Merged
    );
    let edges = kernel.store().edges_for(&short.id).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, EdgeKind::MergedFrom);

    // Predict
    let briefing = kernel.predictor().predict(now).await.unwrap();
    assert!(briefing.generated_prose);
    assert_eq!(briefing.active_context, "Mid-migration to X.");
    let threads: Vec<&str> = briefing.open_threads.iter().map(|t| t.thread.as_str()).collect();
    assert!(threads.contains(&"benchmark X"));
    assert!(threads.contains(&"review runbook"));
    let markdown = briefing.render_markdown();
    assert!(markdown.starts_with("# PRELOAD: Session Briefing"));
    assert!(markdown.contains("**Dana**"));

    // Nothing new to consolidate
    let again = kernel.consolidator().run(&log, false, now).await.unwrap();
    assert_eq!(again.batch.total(), 0);
    assert_eq!(generator.calls("consolidate"), 2);

    // Status reflects the run
    let status = kernel.status().unwrap();
    assert_eq!(status.session_cursor, 2);
    assert_eq!(status.session_entries, 2);
    assert!(status.last_compaction.is_some());
    assert_eq!(status.stats.active(), 3);
}

#[tokio::test]
async fn test_consolidation_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    {
        let generator = RoutedGenerator::new("distinct");
        let kernel = kernel(dir.path(), generator.clone());
        let log = kernel.session_log(None).unwrap();
        let mut config = kernel.config().consolidation.clone();
        config.max_entries_per_run = 1;
        let engine = hippo_kernel::Consolidator::new(
            kernel.store().clone(),
            generator,
            config,
            kernel.cancel_flag(),
        );
        let report = engine.run(&log, false, now).await.unwrap();
        assert_eq!(report.cursor_after, 1);
    }

    let generator = RoutedGenerator::new("distinct");
    let kernel = kernel(dir.path(), generator.clone());
    let log = kernel.session_log(None).unwrap();
    let report = kernel.consolidator().run(&log, false, now).await.unwrap();
    assert_eq!(report.cursor_before, 1);
    assert_eq!(report.batch.processed, 1);
    assert_eq!(generator.calls("consolidate"), 1);
    assert_eq!(kernel.store().get_all(false).unwrap().len(), 2);
}

#[tokio::test]
async fn test_dry_run_related_pair_recommends_edge_only() {
    let dir = tempfile::tempdir().unwrap();
    let generator = RoutedGenerator::new("related");
    let kernel = kernel(dir.path(), generator);
    seed_notes(kernel.store());
    let before = kernel.store().stats().unwrap();

    let report = kernel.compactor().run(true, None, Utc::now()).await.unwrap();
    assert!(report.batch.dry_run);
    assert_eq!(report.actions.len(), 1);
    assert!(matches!(report.actions[0].outcome, ActionOutcome::Relate { .. }));
    assert_eq!(kernel.store().stats().unwrap(), before);
}

#[tokio::test]
async fn test_offline_classifier_leaves_store_intact() {
    let dir = tempfile::tempdir().unwrap();
    let generator = RoutedGenerator::new("duplicate");
    generator.set_offline("classify");
    let kernel = kernel(dir.path(), generator);
    seed_notes(kernel.store());

    let report = kernel.compactor().run(false, None, Utc::now()).await.unwrap();
    assert_eq!(report.batch.skipped, 1);
    assert_eq!(kernel.store().get_all(false).unwrap().len(), 2);
    assert!(kernel.store().visited_pairs().unwrap().is_empty());
}

#[tokio::test]
async fn test_briefing_falls_back_when_generator_offline() {
    let dir = tempfile::tempdir().unwrap();
    let generator = RoutedGenerator::new("distinct");
    let kernel = kernel(dir.path(), generator.clone());
    let log = kernel.session_log(None).unwrap();
    kernel.consolidator().run(&log, false, Utc::now()).await.unwrap();
    generator.set_offline("brief");

    let briefing = kernel.predictor().predict(Utc::now()).await.unwrap();
    assert!(!briefing.generated_prose);
    assert!(briefing.next_actions.iter().all(|a| a.starts_with("Follow up: ")));
    assert!(!briefing.active_context.is_empty());
}
