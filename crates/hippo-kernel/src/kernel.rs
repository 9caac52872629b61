//! HippoKernel: assembles the store, inference handles and engines.
//!
//! Every engine receives explicit handles from here; nothing is global.

use crate::cancel::CancelFlag;
use crate::compactor::{Compactor, LAST_RUN_CURSOR};
use crate::consolidator::{Consolidator, SESSION_CURSOR};
use crate::error::{KernelError, KernelResult};
use crate::predictor::Predictor;
use crate::retriever::Retriever;
use crate::tagger::Tagger;
use hippo_memory::{MemoryStore, Scorer, SimilarityIndex, SqliteEmbeddingIndex, StoreStats};
use hippo_runtime::{select_backend, Classifier, Generator, LlmClassifier, MarkdownSessionLog, SessionSource};
use hippo_types::config::{CompactionConfig, HippoConfig};
use hippo_types::error::HippoResult;
use hippo_types::record::SESSION_SUMMARY;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Snapshot printed by `hippo status`.
#[derive(Debug, Clone, Serialize)]
pub struct KernelStatus {
    pub db_path: PathBuf,
    pub session_log: PathBuf,
    pub backend: String,
    pub stats: StoreStats,
    /// Session entries consumed so far.
    pub session_cursor: u64,
    /// Session entries present in the log.
    pub session_entries: u64,
    pub last_compaction: Option<String>,
    /// Open threads of the most recent session summary.
    pub open_threads: Vec<String>,
}

pub struct HippoKernel {
    config: HippoConfig,
    store: MemoryStore,
    generator: Arc<dyn Generator>,
    classifier: Arc<dyn Classifier>,
    index: Arc<dyn SimilarityIndex>,
    scorer: Scorer,
    cancel: CancelFlag,
}

impl HippoKernel {
    /// Validate config, open the store and resolve the inference backend once.
    pub fn boot(config: HippoConfig) -> KernelResult<Self> {
        config.validate()?;
        let db_path = config.resolved_db_path();
        let store = MemoryStore::open(&db_path, &config.storage)
            .map_err(|e| KernelError::BootFailed(format!("{}: {e}", db_path.display())))?;
        let backend = select_backend(&config.inference)?;
        info!(
            db = %db_path.display(),
            backend = backend.kind(),
            "Kernel booted"
        );
        let generator: Arc<dyn Generator> = Arc::new(backend);
        let classifier = classifier_for(Arc::clone(&generator), &config.compaction);
        Self::from_parts(config, store, generator, classifier)
    }

    /// Assemble from explicit handles.
    pub fn from_parts(
        config: HippoConfig,
        store: MemoryStore,
        generator: Arc<dyn Generator>,
        classifier: Arc<dyn Classifier>,
    ) -> KernelResult<Self> {
        let scorer = Scorer::new(config.scoring.clone())?;
        let index: Arc<dyn SimilarityIndex> = Arc::new(SqliteEmbeddingIndex::new(store.clone()));
        Ok(Self {
            config,
            store,
            generator,
            classifier,
            index,
            scorer,
            cancel: CancelFlag::new(),
        })
    }

    pub fn config(&self) -> &HippoConfig {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn backend_name(&self) -> &str {
        self.generator.name()
    }

    pub fn compactor(&self) -> Compactor {
        Compactor::new(
            self.store.clone(),
            Arc::clone(&self.classifier),
            self.config.compaction.clone(),
            self.cancel.clone(),
        )
    }

    pub fn consolidator(&self) -> Consolidator {
        Consolidator::new(
            self.store.clone(),
            Arc::clone(&self.generator),
            self.config.consolidation.clone(),
            self.cancel.clone(),
        )
    }

    pub fn tagger(&self) -> Tagger {
        Tagger::new(
            self.store.clone(),
            Arc::clone(&self.generator),
            self.config.tagging.clone(),
            self.cancel.clone(),
        )
    }

    pub fn predictor(&self) -> Predictor {
        Predictor::new(
            self.store.clone(),
            Arc::clone(&self.generator),
            self.scorer.clone(),
            self.config.prediction.clone(),
        )
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.store.clone(), self.scorer.clone(), Arc::clone(&self.index))
    }

    /// Open the session log, `path` overriding the configured one.
    pub fn session_log(&self, path: Option<&Path>) -> HippoResult<MarkdownSessionLog> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.resolved_session_log());
        MarkdownSessionLog::open(&path)
    }

    pub fn status(&self) -> HippoResult<KernelStatus> {
        let stats = self.store.stats()?;
        let log = self.session_log(None)?;
        let open_threads = self
            .store
            .recent_by_category(SESSION_SUMMARY, 1)?
            .first()
            .map(|r| r.metadata_strings("open_threads"))
            .unwrap_or_default();
        Ok(KernelStatus {
            db_path: self.config.resolved_db_path(),
            session_log: self.config.resolved_session_log(),
            backend: self.backend_name().to_string(),
            session_cursor: self.store.get_position(SESSION_CURSOR)?,
            session_entries: log.len(),
            last_compaction: self.store.get_cursor(LAST_RUN_CURSOR)?,
            open_threads,
            stats,
        })
    }
}

/// The merge classifier, with the compaction generation budget.
fn classifier_for(generator: Arc<dyn Generator>, config: &CompactionConfig) -> Arc<dyn Classifier> {
    Arc::new(LlmClassifier::new(generator).with_limits(config.max_tokens, config.temperature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hippo_types::config::BackendChoice;
    use hippo_types::record::MemoryRecord;
    use std::sync::Mutex;

    fn offline_config(dir: &Path) -> HippoConfig {
        let mut config = HippoConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        };
        config.inference.backend = BackendChoice::Offline;
        config
    }

    #[test]
    fn test_boot_offline_creates_store() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = HippoKernel::boot(offline_config(dir.path())).unwrap();
        assert_eq!(kernel.backend_name(), "offline");
        assert!(dir.path().join("memory.db").exists());

        let status = kernel.status().unwrap();
        assert_eq!(status.stats.total, 0);
        assert_eq!(status.session_entries, 0);
        assert!(status.last_compaction.is_none());
    }

    #[test]
    fn test_boot_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.scoring.half_life_days = 0.0;
        let err = HippoKernel::boot(config).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_offline_predict_still_works() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = HippoKernel::boot(offline_config(dir.path())).unwrap();
        let briefing = tokio_test::block_on(kernel.predictor().predict(chrono::Utc::now())).unwrap();
        assert!(briefing.empty);
    }

    #[derive(Default)]
    struct BudgetRecorder(Mutex<Vec<(u32, f32)>>);

    #[async_trait]
    impl Generator for BudgetRecorder {
        async fn generate(&self, _prompt: &str, max_tokens: u32, temperature: f32) -> HippoResult<String> {
            self.0.lock().unwrap().push((max_tokens, temperature));
            Ok(r#"{"relationship": "distinct", "confidence": 0.9}"#.to_string())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    #[test]
    fn test_classifier_uses_compaction_budget() {
        let recorder = Arc::new(BudgetRecorder::default());
        let config = CompactionConfig {
            max_tokens: 300,
            temperature: 0.05,
            ..CompactionConfig::default()
        };
        let classifier = classifier_for(recorder.clone(), &config);
        let now = chrono::Utc::now();
        let a = MemoryRecord::new("alpha note", "note", now);
        let b = MemoryRecord::new("beta note", "note", now);
        tokio_test::block_on(classifier.classify(&a, &b)).unwrap();
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &[(300, 0.05)]);
    }
}
