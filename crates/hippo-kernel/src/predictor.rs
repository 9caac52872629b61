//! Predictor: the pre-session briefing.
//!
//! Structure is deterministic and built from the store alone: recent session
//! summaries, their open threads, the people they mention, and the records
//! that score best against each thread. The generator only contributes the
//! prose of two sections and is optional; without it those sections fall
//! back to the newest summary and the open threads.

use chrono::{DateTime, Utc};
use hippo_memory::text::text_similarity;
use hippo_memory::{MemoryStore, Scorer};
use hippo_runtime::extract::extract_json_object;
use hippo_runtime::prompts::{briefing_prompt, truncate_chars};
use hippo_runtime::Generator;
use hippo_types::config::PredictionConfig;
use hippo_types::error::HippoResult;
use hippo_types::record::{MemoryRecord, RecordId, SESSION_SUMMARY};
use hippo_types::serde_compat::{strings_lenient, text_lenient};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SNIPPET_CHARS: usize = 160;
const FALLBACK_ACTIONS: usize = 3;

/// A record listed under an open thread.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedRecord {
    pub id: RecordId,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadContext {
    pub thread: String,
    pub related: Vec<RelatedRecord>,
}

/// Last known state of someone mentioned in a session.
#[derive(Debug, Clone, Serialize)]
pub struct PersonState {
    pub name: String,
    pub last_seen: DateTime<Utc>,
    pub context: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Briefing {
    pub generated_at: DateTime<Utc>,
    /// No session summaries existed.
    pub empty: bool,
    pub active_context: String,
    pub open_threads: Vec<ThreadContext>,
    pub people: Vec<PersonState>,
    pub next_actions: Vec<String>,
    /// Session summaries the briefing was built from, newest first.
    pub sources: Vec<RecordId>,
    /// The prose sections came from the generator rather than the fallback.
    pub generated_prose: bool,
}

#[derive(Debug, Default, Deserialize)]
struct BriefingProse {
    #[serde(default, deserialize_with = "text_lenient")]
    active_context: String,
    #[serde(default, deserialize_with = "strings_lenient")]
    next_actions: Vec<String>,
}

impl Briefing {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            generated_at: now,
            empty: true,
            active_context: String::new(),
            open_threads: Vec::new(),
            people: Vec::new(),
            next_actions: Vec::new(),
            sources: Vec::new(),
            generated_prose: false,
        }
    }

    /// Render as the markdown preload document.
    pub fn render_markdown(&self) -> String {
        let mut out = String::from("# PRELOAD: Session Briefing\n\n");
        let _ = writeln!(out, "_Generated {}_\n", self.generated_at.format("%Y-%m-%d %H:%M UTC"));

        if self.empty {
            out.push_str("No prior context: no session summaries have been consolidated yet.\n");
            return out;
        }

        out.push_str("## Active Context\n\n");
        let _ = writeln!(out, "{}\n", self.active_context);

        out.push_str("## Open Threads\n\n");
        if self.open_threads.is_empty() {
            out.push_str("- None\n");
        }
        for thread in &self.open_threads {
            let _ = writeln!(out, "- {}", thread.thread);
            for related in &thread.related {
                let _ = writeln!(out, "  - {} (score {:.2})", related.snippet, related.score);
            }
        }
        out.push('\n');

        out.push_str("## Key People State\n\n");
        if self.people.is_empty() {
            out.push_str("- None\n");
        }
        for person in &self.people {
            let _ = writeln!(
                out,
                "- **{}** (last seen {}): {}",
                person.name,
                person.last_seen.format("%Y-%m-%d"),
                person.context
            );
        }
        out.push('\n');

        out.push_str("## Suggested Next Actions\n\n");
        if self.next_actions.is_empty() {
            out.push_str("1. Review the open threads above\n");
        }
        for (i, action) in self.next_actions.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, action);
        }
        out
    }
}

pub struct Predictor {
    store: MemoryStore,
    generator: Arc<dyn Generator>,
    scorer: Scorer,
    config: PredictionConfig,
}

impl Predictor {
    pub fn new(
        store: MemoryStore,
        generator: Arc<dyn Generator>,
        scorer: Scorer,
        config: PredictionConfig,
    ) -> Self {
        Self {
            store,
            generator,
            scorer,
            config,
        }
    }

    /// Build the briefing. An empty store gives an empty briefing, not an error.
    pub async fn predict(&self, now: DateTime<Utc>) -> HippoResult<Briefing> {
        let mut summaries = self.store.recent_by_category(SESSION_SUMMARY, usize::MAX)?;
        if summaries.is_empty() {
            info!("No session summaries, empty briefing");
            return Ok(Briefing::empty(now));
        }

        // Threads stay open until their summary is retired, however old it is.
        let threads = open_threads(&summaries);
        summaries.truncate(self.config.recent_summaries);
        let people = people_state(&summaries);
        let summary_ids: HashSet<&RecordId> = summaries.iter().map(|s| &s.id).collect();
        let pool: Vec<MemoryRecord> = self
            .store
            .get_all(false)?
            .into_iter()
            .filter(|r| !summary_ids.contains(&r.id))
            .collect();

        let mut touched: Vec<RecordId> = Vec::new();
        let open_threads: Vec<ThreadContext> = threads
            .iter()
            .map(|thread| {
                let candidates = pool
                    .iter()
                    .map(|r| (r.clone(), text_similarity(thread, &r.content)))
                    .filter(|(_, sim)| *sim > 0.0);
                let related: Vec<RelatedRecord> = self
                    .scorer
                    .rank(candidates, now)
                    .into_iter()
                    .take(self.config.related_per_thread)
                    .map(|s| RelatedRecord {
                        id: s.record.id.clone(),
                        snippet: snippet(&s.record.content),
                        score: s.score,
                    })
                    .collect();
                for r in &related {
                    if !touched.contains(&r.id) {
                        touched.push(r.id.clone());
                    }
                }
                ThreadContext {
                    thread: thread.clone(),
                    related,
                }
            })
            .collect();
        self.store.record_access(&touched, now)?;

        let prose = self.prose(&summaries, &threads, &people).await;
        let mut briefing = Briefing {
            generated_at: now,
            empty: false,
            active_context: String::new(),
            open_threads,
            people,
            next_actions: Vec::new(),
            sources: summaries.iter().map(|s| s.id.clone()).collect(),
            generated_prose: false,
        };

        match prose {
            Ok(Some(prose)) => {
                briefing.active_context = prose.active_context;
                briefing.next_actions = prose.next_actions;
                briefing.generated_prose = true;
            }
            Ok(None) => {}
            Err(e) if e.is_recoverable_inference() => {
                warn!(error = %e, "Briefing prose unavailable, using fallback");
            }
            Err(e) => return Err(e),
        }
        if !briefing.generated_prose {
            briefing.active_context = summaries[0].content.clone();
            briefing.next_actions = threads
                .iter()
                .take(FALLBACK_ACTIONS)
                .map(|t| format!("Follow up: {t}"))
                .collect();
        }

        info!(
            summaries = summaries.len(),
            threads = briefing.open_threads.len(),
            people = briefing.people.len(),
            generated_prose = briefing.generated_prose,
            "Briefing built"
        );
        Ok(briefing)
    }

    async fn prose(
        &self,
        summaries: &[MemoryRecord],
        threads: &[String],
        people: &[PersonState],
    ) -> HippoResult<Option<BriefingProse>> {
        let texts: Vec<String> = summaries.iter().map(|s| s.content.clone()).collect();
        let names: Vec<String> = people.iter().map(|p| p.name.clone()).collect();
        let response = self
            .generator
            .generate(
                &briefing_prompt(&texts, threads, &names),
                self.config.max_tokens,
                self.config.temperature,
            )
            .await?;
        let Some(value) = extract_json_object(&response) else {
            debug!("Briefing response had no JSON object");
            return Ok(None);
        };
        let prose: BriefingProse = serde_json::from_value(value).unwrap_or_default();
        if prose.active_context.is_empty() {
            return Ok(None);
        }
        Ok(Some(prose))
    }
}

/// Open threads across summaries, newest first, deduplicated case-insensitively.
fn open_threads(summaries: &[MemoryRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    summaries
        .iter()
        .flat_map(|s| s.metadata_strings("open_threads"))
        .filter(|t| !t.trim().is_empty() && seen.insert(t.trim().to_lowercase()))
        .collect()
}

fn people_state(summaries: &[MemoryRecord]) -> Vec<PersonState> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for summary in summaries {
        for name in summary.metadata_strings("people") {
            if seen.insert(name.to_lowercase()) {
                out.push(PersonState {
                    name,
                    last_seen: summary.created_at,
                    context: snippet(&summary.content),
                });
            }
        }
    }
    out
}

fn snippet(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_chars(&flat, SNIPPET_CHARS);
    if cut.len() < flat.len() {
        format!("{cut}...")
    } else {
        flat
    }
}
