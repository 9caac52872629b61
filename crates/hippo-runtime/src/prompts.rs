//! Prompt templates sent to the generator.

use hippo_types::record::MemoryRecord;

/// Session text beyond this many characters is cut before prompting.
pub const MAX_SESSION_CHARS: usize = 6_000;

/// Structured summary of one session entry.
pub fn consolidation_prompt(session_text: &str) -> String {
    format!(
        r#"You are a memory consolidation system. Given the following session log, extract a structured summary.

SESSION LOG:
{session}

Return a JSON object with exactly these fields:
{{
  "summary": "A 50-100 word dense summary of what changed, what was decided, what's unresolved",
  "entities": {{
    "people": ["people mentioned"],
    "projects": ["projects or products affected"],
    "tools": ["tech, tools, or services referenced"]
  }},
  "security_flags": ["regulated data or permission boundaries discussed"],
  "emotional_signals": ["frustration, excitement, urgency, or other tone"],
  "open_threads": ["unresolved items or follow-ups"]
}}

Return ONLY the JSON object, no other text."#,
        session = truncate_chars(session_text, MAX_SESSION_CHARS)
    )
}

/// Entity extraction for one record.
pub fn tag_prompt(content: &str) -> String {
    format!(
        r#"Given this memory content, extract entity tags.

MEMORY:
{content}

Return a JSON object with exactly these fields:
{{
  "people": ["people mentioned by name"],
  "projects": ["projects, products, or companies"],
  "tools": ["technologies, tools, services"],
  "topics": ["abstract topics or themes"],
  "suggested_tags": ["all tags combined"]
}}

Return ONLY the JSON object, no other text."#
    )
}

/// Pairwise relationship between two records.
pub fn merge_prompt(a: &MemoryRecord, b: &MemoryRecord) -> String {
    format!(
        r#"You are a memory deduplication system. Given these two memories, determine how they relate.

MEMORY A (created {date_a}):
{content_a}

MEMORY B (created {date_b}):
{content_b}

Return a JSON object:
{{
  "relationship": "duplicate" | "superseded" | "related" | "distinct",
  "keep": "A" | "B" | "both" | "merge",
  "merged_content": "If keep is 'merge', the merged text keeping every fact from both. Otherwise empty.",
  "confidence": 0.0,
  "reasoning": "Brief explanation"
}}

Rules:
- "duplicate": Nearly identical information.
- "superseded": One updates or replaces the other.
- "related": Same topic, distinct information.
- "distinct": Unrelated.
- Use "merge" only when both memories hold complementary facts that belong in one entry.

Return ONLY the JSON object."#,
        date_a = a.created_at.format("%Y-%m-%d"),
        content_a = a.content,
        date_b = b.created_at.format("%Y-%m-%d"),
        content_b = b.content,
    )
}

/// Prose for the briefing's free-text sections.
pub fn briefing_prompt(summaries: &[String], open_threads: &[String], people: &[String]) -> String {
    let bullet = |items: &[String], empty: &str| {
        if items.is_empty() {
            empty.to_string()
        } else {
            items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
        }
    };
    format!(
        r#"You are a session preparation system. Given the context of an ongoing collaboration, prepare the next session.

RECENT SESSION SUMMARIES (newest first):
{summaries}

OPEN THREADS:
{threads}

PEOPLE MENTIONED:
{people}

Return a JSON object:
{{
  "active_context": "2-3 sentences: what is in progress and where the last session ended",
  "next_actions": ["2-3 concrete first moves for the next session"]
}}

Return ONLY the JSON object."#,
        summaries = bullet(summaries, "(none)"),
        threads = bullet(open_threads, "(none)"),
        people = bullet(people, "(none)"),
    )
}

/// Cut `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
