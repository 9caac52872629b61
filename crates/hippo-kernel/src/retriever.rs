//! Recall: ranked retrieval with explicit access tracking.

use chrono::{DateTime, Utc};
use hippo_memory::text::text_similarity;
use hippo_memory::{MemoryStore, ScoredRecord, Scorer, SimilarityIndex};
use hippo_types::error::HippoResult;
use hippo_types::record::RecordId;
use std::sync::Arc;
use tracing::debug;

pub struct Retriever {
    store: MemoryStore,
    scorer: Scorer,
    index: Arc<dyn SimilarityIndex>,
}

impl Retriever {
    pub fn new(store: MemoryStore, scorer: Scorer, index: Arc<dyn SimilarityIndex>) -> Self {
        Self {
            store,
            scorer,
            index,
        }
    }

    /// Top `limit` active records for `query`, best first.
    ///
    /// Similarity is the index's cosine when a query vector is given and the
    /// record has one, otherwise token overlap with the query text. Records
    /// with no overlap at all are not returned. The returned records are
    /// then marked as accessed.
    pub fn recall(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> HippoResult<Vec<ScoredRecord>> {
        let records = self.store.get_all(false)?;
        let mut candidates = Vec::with_capacity(records.len());
        for record in records {
            let vector = match query_embedding {
                Some(_) => self.index.embedding_for(&record.id)?,
                None => None,
            };
            let similarity = match (query_embedding, vector) {
                (Some(q), Some(v)) => f64::from(self.index.similarity(q, &v)),
                _ => text_similarity(query, &record.content),
            };
            if similarity > 0.0 {
                candidates.push((record, similarity));
            }
        }

        let mut ranked = self.scorer.rank(candidates, now);
        ranked.truncate(limit);
        let ids: Vec<RecordId> = ranked.iter().map(|s| s.record.id.clone()).collect();
        if !ids.is_empty() {
            self.store.record_access(&ids, now)?;
        }
        debug!(query, hits = ranked.len(), "Recall");
        Ok(ranked)
    }
}
