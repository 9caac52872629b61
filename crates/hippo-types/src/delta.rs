//! State deltas: the structured summary extracted from one session entry.

use crate::serde_compat::{collect_list, strings_lenient, text_lenient};
use serde::{Deserialize, Serialize};

/// Placeholder words a model uses to mean "nothing here".
const EMPTY_MARKERS: &[&str] = &["none", "n/a", "na", "null", "neutral", "nothing", "-"];

/// Transient output of session consolidation. Every field defaults to empty
/// on its own; a bad field never discards the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    /// Dense summary of what changed, what was decided, what is unresolved.
    #[serde(default, alias = "state_delta", deserialize_with = "text_lenient")]
    pub summary: String,
    /// Every named entity (people, projects, tools), flattened.
    #[serde(default, deserialize_with = "entities_lenient")]
    pub entities: EntityList,
    /// Sensitive-data or permission boundaries mentioned in the session.
    #[serde(default, alias = "security_context", deserialize_with = "strings_lenient")]
    pub security_flags: Vec<String>,
    /// Detected tone: frustration, urgency, excitement.
    #[serde(default, deserialize_with = "strings_lenient")]
    pub emotional_signals: Vec<String>,
    /// Unresolved items and follow-ups.
    #[serde(default, deserialize_with = "strings_lenient")]
    pub open_threads: Vec<String>,
}

/// Entities plus the subset the model filed under `people`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityList {
    pub all: Vec<String>,
    pub people: Vec<String>,
}

impl StateDelta {
    /// Parse a delta out of a JSON document, field by field.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut delta: StateDelta = match value {
            serde_json::Value::Object(map) => {
                // A field given under both its name and its alias would be a
                // duplicate-field error; the canonical name wins.
                let mut map = map.clone();
                if map.contains_key("summary") {
                    map.remove("state_delta");
                }
                if map.contains_key("security_flags") {
                    map.remove("security_context");
                }
                serde_json::from_value(serde_json::Value::Object(map)).unwrap_or_default()
            }
            _ => StateDelta::default(),
        };
        delta.clean();
        delta
    }

    /// People mentioned in the session.
    pub fn people(&self) -> &[String] {
        &self.entities.people
    }

    /// True when the model produced nothing worth storing.
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    fn clean(&mut self) {
        if is_empty_marker(&self.summary) {
            self.summary.clear();
        }
        for list in [
            &mut self.entities.all,
            &mut self.entities.people,
            &mut self.security_flags,
            &mut self.emotional_signals,
            &mut self.open_threads,
        ] {
            dedup_in_place(list);
        }
    }
}

/// Output of the entity-tagging prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTags {
    #[serde(default, deserialize_with = "strings_lenient")]
    pub people: Vec<String>,
    #[serde(default, deserialize_with = "strings_lenient")]
    pub projects: Vec<String>,
    #[serde(default, deserialize_with = "strings_lenient")]
    pub tools: Vec<String>,
    #[serde(default, deserialize_with = "strings_lenient")]
    pub topics: Vec<String>,
    #[serde(default, deserialize_with = "strings_lenient")]
    pub suggested_tags: Vec<String>,
}

impl EntityTags {
    /// Parse tags out of a JSON document; non-objects give an empty set.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut tags: EntityTags = match value {
            serde_json::Value::Object(_) => {
                serde_json::from_value(value.clone()).unwrap_or_default()
            }
            _ => EntityTags::default(),
        };
        for list in [
            &mut tags.people,
            &mut tags.projects,
            &mut tags.tools,
            &mut tags.topics,
            &mut tags.suggested_tags,
        ] {
            dedup_in_place(list);
        }
        tags
    }

    /// The tag set to apply: `suggested_tags` when given, else every category.
    pub fn tags(&self) -> Vec<String> {
        if !self.suggested_tags.is_empty() {
            return self.suggested_tags.clone();
        }
        self.people
            .iter()
            .chain(&self.projects)
            .chain(&self.tools)
            .chain(&self.topics)
            .cloned()
            .collect()
    }
}

fn is_empty_marker(s: &str) -> bool {
    let lowered = s.trim().to_lowercase();
    lowered.is_empty() || EMPTY_MARKERS.contains(&lowered.as_str())
}

fn dedup_in_place(list: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    list.retain(|item| !is_empty_marker(item) && seen.insert(item.to_lowercase()));
    for item in list.iter_mut() {
        *item = item.trim().to_string();
    }
}

fn entities_lenient<'de, D>(deserializer: D) -> Result<EntityList, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let mut list = EntityList::default();
    if let serde_json::Value::Object(map) = &value {
        if let Some(people) = map.get("people") {
            collect_list(people, &mut list.people);
        }
    }
    collect_list(&value, &mut list.all);
    Ok(list)
}
