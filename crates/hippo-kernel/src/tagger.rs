//! Tagger: entity extraction into record tags.

use crate::cancel::CancelFlag;
use futures::stream::{self, StreamExt};
use hippo_memory::MemoryStore;
use hippo_runtime::extract::extract_json_object;
use hippo_runtime::prompts::tag_prompt;
use hippo_runtime::Generator;
use hippo_types::config::TaggingConfig;
use hippo_types::delta::EntityTags;
use hippo_types::error::{HippoError, HippoResult};
use hippo_types::record::{merge_tags, MemoryRecord, RecordId};
use hippo_types::report::BatchReport;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tags applied to one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagOutcome {
    pub id: RecordId,
    /// Tags that were not present before.
    pub added: Vec<String>,
    /// The record's full tag list afterwards.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaggingReport {
    #[serde(flatten)]
    pub batch: BatchReport,
    pub outcomes: Vec<TagOutcome>,
}

pub struct Tagger {
    store: MemoryStore,
    generator: Arc<dyn Generator>,
    config: TaggingConfig,
    cancel: CancelFlag,
}

impl Tagger {
    pub fn new(
        store: MemoryStore,
        generator: Arc<dyn Generator>,
        config: TaggingConfig,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            cancel,
        }
    }

    /// Tag a single record regardless of how many tags it has.
    pub async fn tag_one(&self, id: &RecordId) -> HippoResult<TagOutcome> {
        let record = self
            .store
            .get_by_id(id)?
            .ok_or_else(|| HippoError::NotFound(id.to_string()))?;
        let extracted = self.extract(&record).await?;
        self.apply(&record, &extracted)
    }

    /// Tag every active record below the tag-count threshold.
    pub async fn tag_all(&self) -> HippoResult<TaggingReport> {
        let mut report = TaggingReport {
            batch: BatchReport::new(false),
            outcomes: Vec::new(),
        };
        let threshold = self.config.tag_threshold;
        let (eligible, saturated): (Vec<_>, Vec<_>) = self
            .store
            .get_all(false)?
            .into_iter()
            .partition(|r| r.tags.len() < threshold);
        report.batch.skipped += saturated.len();
        info!(
            eligible = eligible.len(),
            saturated = saturated.len(),
            threshold,
            "Batch tagging started"
        );

        let workers = self.config.workers.max(1);
        let mut results: Vec<(MemoryRecord, Option<HippoResult<Vec<String>>>)> =
            stream::iter(eligible)
                .map(|record| async move {
                    if self.cancel.is_cancelled() {
                        return (record, None);
                    }
                    let extracted = self.extract(&record).await;
                    (record, Some(extracted))
                })
                .buffer_unordered(workers)
                .collect()
                .await;
        results.sort_by(|a, b| a.0.id.cmp(&b.0.id));

        for (record, result) in results {
            let extracted = match result {
                None => {
                    report.batch.cancelled = true;
                    continue;
                }
                Some(Ok(tags)) => tags,
                Some(Err(e @ HippoError::InferenceUnavailable(_))) => {
                    warn!(id = %record.id.short(), error = %e, "Generator unavailable, record skipped");
                    report.batch.skipped += 1;
                    continue;
                }
                Some(Err(e)) if e.is_fatal() => return Err(e),
                Some(Err(e)) => {
                    warn!(id = %record.id.short(), error = %e, "Tag extraction failed");
                    report.batch.failed += 1;
                    continue;
                }
            };
            match self.apply(&record, &extracted) {
                Ok(outcome) => {
                    report.batch.processed += 1;
                    report.outcomes.push(outcome);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(id = %record.id.short(), error = %e, "Failed to write tags");
                    report.batch.failed += 1;
                }
            }
        }

        info!(
            processed = report.batch.processed,
            skipped = report.batch.skipped,
            failed = report.batch.failed,
            "Batch tagging finished"
        );
        Ok(report)
    }

    /// One generation call; the response must contain a JSON object.
    async fn extract(&self, record: &MemoryRecord) -> HippoResult<Vec<String>> {
        let response = self
            .generator
            .generate(
                &tag_prompt(&record.content),
                self.config.max_tokens,
                self.config.temperature,
            )
            .await?;
        let value = extract_json_object(&response).ok_or_else(|| {
            HippoError::InferenceMalformedResponse("no JSON object in tag response".to_string())
        })?;
        Ok(EntityTags::from_json(&value).tags())
    }

    fn apply(&self, record: &MemoryRecord, extracted: &[String]) -> HippoResult<TagOutcome> {
        let merged = merge_tags(&record.tags, extracted);
        let known: HashSet<String> = record.tags.iter().map(|t| t.to_lowercase()).collect();
        let added: Vec<String> = merged
            .iter()
            .filter(|t| !known.contains(&t.to_lowercase()))
            .cloned()
            .collect();
        let tags = if merged == record.tags {
            record.tags.clone()
        } else {
            self.store.update_tags(&record.id, &merged)?
        };
        debug!(id = %record.id.short(), added = added.len(), total = tags.len(), "Record tagged");
        Ok(TagOutcome {
            id: record.id.clone(),
            added,
            tags,
        })
    }
}
