//! Pairwise relationship classification.

use crate::extract::extract_json_object;
use crate::generator::Generator;
use crate::prompts::merge_prompt;
use async_trait::async_trait;
use hippo_types::error::{HippoError, HippoResult};
use hippo_types::inference::{Classification, Relationship};
use hippo_types::record::MemoryRecord;
use hippo_types::serde_compat::{confidence_lenient, text_lenient};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Judges how two records relate.
///
/// `InferenceUnavailable` means "could not judge" and the pair is left for a
/// later run; `InferenceMalformedResponse` means "judged, but unreadable".
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, a: &MemoryRecord, b: &MemoryRecord) -> HippoResult<Classification>;
}

/// Classifier backed by a text generator and the merge-evaluation prompt.
pub struct LlmClassifier {
    generator: Arc<dyn Generator>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClassifier {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            max_tokens: 512,
            temperature: 0.1,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, a: &MemoryRecord, b: &MemoryRecord) -> HippoResult<Classification> {
        let prompt = merge_prompt(a, b);
        let response = self
            .generator
            .generate(&prompt, self.max_tokens, self.temperature)
            .await?;
        let classification = parse_classification(&response)?;
        debug!(
            a = %a.id.short(),
            b = %b.id.short(),
            label = %classification.label,
            merge = classification.merge.is_some(),
            "pair classified"
        );
        Ok(classification)
    }
}

#[derive(Debug, Default, Deserialize)]
struct MergeVerdict {
    #[serde(default, deserialize_with = "text_lenient")]
    relationship: String,
    #[serde(default, deserialize_with = "text_lenient")]
    keep: String,
    #[serde(default, deserialize_with = "text_lenient")]
    merged_content: String,
    #[serde(default, alias = "rationale", deserialize_with = "text_lenient")]
    reasoning: String,
    #[serde(default, deserialize_with = "confidence_lenient")]
    confidence: Option<f32>,
}

/// Map a merge-evaluation response to a classification. `keep = "merge"` is
/// the explicit-merge signal; it is ignored for distinct pairs.
pub fn parse_classification(response: &str) -> HippoResult<Classification> {
    let value = extract_json_object(response).ok_or_else(|| {
        HippoError::InferenceMalformedResponse("no JSON object in classifier response".into())
    })?;
    let verdict: MergeVerdict = serde_json::from_value(value)
        .map_err(|e| HippoError::InferenceMalformedResponse(e.to_string()))?;
    let label = Relationship::parse_label(&verdict.relationship).ok_or_else(|| {
        HippoError::InferenceMalformedResponse(format!(
            "unknown relationship '{}'",
            verdict.relationship
        ))
    })?;

    let mut classification = Classification::new(label);
    classification.confidence = verdict.confidence;
    if !verdict.reasoning.is_empty() {
        classification.rationale = Some(verdict.reasoning);
    }
    if verdict.keep.eq_ignore_ascii_case("merge") && label != Relationship::Distinct {
        let merged = Some(verdict.merged_content).filter(|m| !m.trim().is_empty());
        classification = classification.with_merge(merged);
    }
    Ok(classification)
}
