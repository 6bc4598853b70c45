//! Session extraction and memory merge.
//!
//! Turns one finished transcript into memory deltas. Extraction asks the
//! reasoning service for facts, themes and a summary; merging applies those
//! deltas to the current profile and theme document:
//!
//! - facts match existing keys by case-insensitive exact comparison and
//!   overwrite on match (last write wins); otherwise they are inserted as-is
//! - themes match existing titles the same way; a match is updated in place,
//!   anything else is appended with `first_seen` set to the current session
//! - themes are never removed, and only become resolved when extraction says so
//!
//! No fuzzy or semantic deduplication is attempted beyond exact matching.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::error::ReasoningError;
use crate::prompts;
use crate::reasoning::{ReasoningMode, ReasoningRequest, ReasoningService};
use crate::types::{
    Extraction, FactUpdate, Intensity, Profile, ProgressMarker, Role, ThemeDocument, ThemeEntry,
    ThemeStatus, ThemeUpdate, Turn,
};

const FACT_FIELDS: [&str; 3] = ["facts", "new_facts", "updated_facts"];
const KNOWN_FIELDS: [&str; 9] = [
    "facts",
    "new_facts",
    "updated_facts",
    "themes",
    "goals",
    "session_summary",
    "summary",
    "progress_markers",
    "important_moments",
];

/// Result of applying an extraction to current memory
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Profile keys written, in their stored spelling
    pub fact_keys: BTreeSet<String>,
    /// Facts as applied (key in stored spelling)
    pub applied_facts: Vec<FactUpdate>,
    /// Theme entries created or updated, after the merge
    pub touched_themes: Vec<ThemeEntry>,
}

impl MergeOutcome {
    pub fn theme_titles(&self) -> BTreeSet<String> {
        self.touched_themes.iter().map(|t| t.title.clone()).collect()
    }
}

/// Extracts memory deltas from finished sessions
pub struct Extractor {
    service: Arc<dyn ReasoningService>,
}

impl Extractor {
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self { service }
    }

    /// Ask the reasoning service for facts, themes and a summary.
    ///
    /// The output is validated; anything that cannot be read as an extraction
    /// is reported as `ReasoningError::Malformed`.
    pub async fn extract(
        &self,
        transcript: &[Turn],
        profile: &Profile,
        themes: &[ThemeEntry],
    ) -> Result<Extraction, ReasoningError> {
        let request = ReasoningRequest {
            mode: ReasoningMode::Extraction,
            system: prompts::EXTRACTION_SYSTEM.to_string(),
            prompt: prompts::extraction_prompt(transcript, profile, themes),
        };

        let object = self.service.reason(request).await?.into_object()?;
        let extraction = parse_extraction(&object)?;
        debug!(
            facts = extraction.facts.len(),
            themes = extraction.themes.len(),
            "extraction parsed"
        );
        Ok(extraction)
    }
}

/// Validate a raw extraction object.
pub fn parse_extraction(object: &Map<String, Value>) -> Result<Extraction, ReasoningError> {
    if !KNOWN_FIELDS.iter().any(|field| object.contains_key(*field)) {
        return Err(ReasoningError::malformed("no recognizable extraction fields"));
    }

    let mut extraction = Extraction::default();

    for field in FACT_FIELDS {
        if let Some(value) = object.get(field) {
            extraction.facts.extend(parse_facts(field, value)?);
        }
    }

    if let Some(value) = object.get("themes") {
        let items = value
            .as_array()
            .ok_or_else(|| ReasoningError::malformed("themes must be an array"))?;
        extraction.themes = items.iter().filter_map(parse_theme).collect();
    }

    extraction.goals = string_list(object.get("goals"));
    extraction.progress_markers = string_list(object.get("progress_markers"));
    extraction.important_moments = string_list(object.get("important_moments"));
    extraction.summary = ["session_summary", "summary"]
        .iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    extraction.next_session_focus = object
        .get("next_session_focus")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    Ok(extraction)
}

fn parse_facts(field: &str, value: &Value) -> Result<Vec<FactUpdate>, ReasoningError> {
    match value {
        // {"name": "Alex", "job": "nurse"}
        Value::Object(map) => Ok(map
            .iter()
            .filter_map(|(key, value)| fact(key, &scalar_text(value)?))
            .collect()),
        // [{"key": "name", "value": "Alex"}] or ["name: Alex"]
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => {
                    let key = map.get("key").and_then(Value::as_str)?;
                    fact(key, &scalar_text(map.get("value")?)?)
                }
                Value::String(line) => {
                    let (key, value) = line.split_once(':')?;
                    fact(key, value)
                }
                _ => None,
            })
            .collect()),
        _ => Err(ReasoningError::malformed(format!("{field} must be an array or object"))),
    }
}

fn fact(key: &str, value: &str) -> Option<FactUpdate> {
    let key = key.trim();
    let value = value.trim();
    (!key.is_empty() && !value.is_empty()).then(|| FactUpdate {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_theme(value: &Value) -> Option<ThemeUpdate> {
    let map = value.as_object()?;
    let title = ["title", "name"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))?
        .trim();
    if title.is_empty() {
        return None;
    }

    let text = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    Some(ThemeUpdate {
        title: title.to_string(),
        description: text("description").unwrap_or_default().to_string(),
        status: text("status").and_then(ThemeStatus::from_str),
        intensity: text("intensity").and_then(Intensity::from_str),
        notes: text("notes").map(String::from),
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Merge facts into the profile. Returns the facts as stored.
pub fn merge_facts(profile: &mut Profile, facts: &[FactUpdate]) -> Vec<FactUpdate> {
    let mut applied: Vec<FactUpdate> = Vec::new();

    for update in facts {
        let key = profile
            .matching_key(&update.key)
            .map(String::from)
            .unwrap_or_else(|| update.key.trim().to_string());
        profile.facts.insert(key.clone(), update.value.clone());

        // Later facts for the same key in one extraction replace earlier ones
        applied.retain(|f| f.key != key);
        applied.push(FactUpdate { key, value: update.value.clone() });
    }

    applied
}

/// Append goals not already present (case-insensitive).
pub fn merge_goals(profile: &mut Profile, goals: &[String]) {
    for goal in goals {
        let lower = goal.to_lowercase();
        if !profile.goals.iter().any(|g| g.to_lowercase() == lower) {
            profile.goals.push(goal.clone());
        }
    }
}

/// Merge theme updates. Returns the created/updated entries in document order.
pub fn merge_themes(
    themes: &mut Vec<ThemeEntry>,
    updates: &[ThemeUpdate],
    session_index: u32,
) -> Vec<ThemeEntry> {
    let mut touched = BTreeSet::new();

    for update in updates {
        let wanted = update.title.to_lowercase();
        let position = match themes.iter().position(|t| t.title.to_lowercase() == wanted) {
            Some(position) => {
                let theme = &mut themes[position];
                if !update.description.is_empty() {
                    theme.description = update.description.clone();
                }
                if let Some(status) = update.status {
                    theme.status = status;
                }
                if update.intensity.is_some() {
                    theme.intensity = update.intensity;
                }
                if update.notes.is_some() {
                    theme.notes = update.notes.clone();
                }
                theme.last_updated = session_index;
                position
            }
            None => {
                themes.push(ThemeEntry {
                    title: update.title.clone(),
                    description: update.description.clone(),
                    status: update.status.unwrap_or(ThemeStatus::Active),
                    first_seen: session_index,
                    last_updated: session_index,
                    intensity: update.intensity,
                    notes: update.notes.clone(),
                });
                themes.len() - 1
            }
        };
        touched.insert(position);
    }

    touched.into_iter().map(|i| themes[i].clone()).collect()
}

/// Apply a full extraction to the profile and theme document.
pub fn merge(
    extraction: &Extraction,
    profile: &mut Profile,
    themes: &mut ThemeDocument,
    session_index: u32,
) -> MergeOutcome {
    let applied_facts = merge_facts(profile, &extraction.facts);
    merge_goals(profile, &extraction.goals);
    let touched_themes = merge_themes(&mut themes.themes, &extraction.themes, session_index);

    let date = Utc::now().format("%Y-%m-%d").to_string();
    themes
        .progress_markers
        .extend(extraction.progress_markers.iter().map(|milestone| ProgressMarker {
            milestone: milestone.clone(),
            date: date.clone(),
            session_index,
        }));

    MergeOutcome {
        fact_keys: applied_facts.iter().map(|f| f.key.clone()).collect(),
        applied_facts,
        touched_themes,
    }
}

/// Summary used when extraction failed or returned none: the first client
/// turn, truncated to `max_chars`.
pub fn fallback_summary(transcript: &[Turn], max_chars: usize) -> String {
    let first = transcript
        .iter()
        .find(|t| t.role == Role::User && !t.text.trim().is_empty())
        .map(|t| t.text.trim());

    match first {
        Some(text) if text.chars().count() > max_chars => {
            let cut: String = text.chars().take(max_chars).collect();
            format!("{}…", cut.trim_end())
        }
        Some(text) => text.to_string(),
        None => format!("Session of {} turns with no client messages.", transcript.len()),
    }
}

impl ExtractionConfig {
    /// Fallback summary with this config's length limit
    pub fn fallback_summary(&self, transcript: &[Turn]) -> String {
        fallback_summary(transcript, self.fallback_summary_chars)
    }
}
