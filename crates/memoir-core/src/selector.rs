//! Relevance selection.
//!
//! Decides which themes and past sessions to expand for the current turn.
//! The judgment is delegated to the reasoning service; the selector only
//! trusts identifiers that exist in the index it offered. Failures degrade to
//! an empty selection so the conversation turn is never blocked.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::prompts;
use crate::reasoning::{ReasoningMode, ReasoningRequest, ReasoningService};
use crate::types::{MemoryIndex, Selection};

/// Picks relevant memory for one message
pub struct RelevanceSelector {
    service: Arc<dyn ReasoningService>,
}

impl RelevanceSelector {
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self { service }
    }

    /// Select relevant themes/sessions for `message`.
    pub async fn select(&self, message: &str, index: &MemoryIndex) -> Selection {
        self.select_with_profile(message, "", index).await
    }

    /// Same as [`select`](Self::select), with a short profile summary added to the prompt.
    pub async fn select_with_profile(
        &self,
        message: &str,
        profile_summary: &str,
        index: &MemoryIndex,
    ) -> Selection {
        if index.is_empty() {
            debug!("memory index empty, skipping relevance selection");
            return Selection::default();
        }

        let request = ReasoningRequest {
            mode: ReasoningMode::RetrievalSelection,
            system: prompts::SELECTION_SYSTEM.to_string(),
            prompt: prompts::retrieval_prompt(message, profile_summary, index),
        };

        let object = match self.service.reason(request).await.and_then(|r| r.into_object()) {
            Ok(object) => object,
            Err(e) => {
                warn!(service = self.service.name(), error = %e, "relevance selection failed, using profile-only context");
                return Selection::default();
            }
        };

        let selection = validate_selection(&object, index);
        debug!(
            themes = selection.theme_titles.len(),
            sessions = selection.session_indices.len(),
            "relevance selection complete"
        );
        selection
    }
}

/// Keep only identifiers present in `index`; phantom references are dropped.
pub fn validate_selection(object: &Map<String, Value>, index: &MemoryIndex) -> Selection {
    let mut selection = Selection::default();

    for value in array_field(object, "relevant_themes") {
        let Some(title) = value.as_str() else {
            continue;
        };
        match index.canonical_theme_title(title) {
            Some(canonical) => {
                selection.theme_titles.insert(canonical.to_string());
            }
            None => debug!(title, "dropping unknown theme reference"),
        }
    }

    for value in array_field(object, "relevant_sessions") {
        match session_reference(value) {
            Some(session) if index.has_session(session) => {
                selection.session_indices.insert(session);
            }
            _ => debug!(reference = %value, "dropping unknown session reference"),
        }
    }

    selection
}

fn array_field<'a>(object: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Accepts `3`, `"3"`, `"session_003"` and `"Session 3"`.
fn session_reference(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }

    let text = value.as_str()?.trim().to_lowercase();
    let digits = match text.strip_prefix("session") {
        Some(rest) => rest.strip_prefix(['_', ' ', '#']).unwrap_or(rest),
        None => text.as_str(),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasoningError;
    use crate::reasoning::testing::ScriptedReasoner;
    use crate::types::{SessionSummary, ThemeEntry, ThemeStatus};
    use serde_json::json;

    fn theme(title: &str) -> ThemeEntry {
        ThemeEntry {
            title: title.into(),
            description: String::new(),
            status: ThemeStatus::Active,
            first_seen: 1,
            last_updated: 1,
            intensity: None,
            notes: None,
        }
    }

    fn index() -> MemoryIndex {
        MemoryIndex::new(
            &[theme("Anxiety"), theme("Sleep")],
            vec![
                SessionSummary { index: 1, summary: "First meeting".into() },
                SessionSummary { index: 2, summary: "Work stress".into() },
            ],
        )
    }

    #[tokio::test]
    async fn test_phantom_references_dropped() {
        let reasoner = Arc::new(ScriptedReasoner::new().push_json(json!({
            "relevant_themes": ["Anxiety", "Nonexistent"],
            "relevant_sessions": [2, 9],
        })));
        let selector = RelevanceSelector::new(reasoner.clone());

        let selection = selector.select("Work is overwhelming", &index()).await;

        assert_eq!(selection.theme_titles.into_iter().collect::<Vec<_>>(), vec!["Anxiety"]);
        assert_eq!(selection.session_indices.into_iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(reasoner.requests()[0].mode, ReasoningMode::RetrievalSelection);
    }

    #[tokio::test]
    async fn test_titles_matched_case_insensitively() {
        let reasoner = Arc::new(ScriptedReasoner::new().push_json(json!({
            "relevant_themes": ["sleep", " ANXIETY "],
        })));
        let selector = RelevanceSelector::new(reasoner);

        let selection = selector.select("tired and worried", &index()).await;
        let titles: Vec<_> = selection.theme_titles.into_iter().collect();
        assert_eq!(titles, vec!["Anxiety", "Sleep"]);
    }

    #[tokio::test]
    async fn test_service_failure_degrades_to_empty() {
        let reasoner = Arc::new(
            ScriptedReasoner::new().push_error(ReasoningError::Timeout { duration_ms: 30_000 }),
        );
        let selector = RelevanceSelector::new(reasoner);

        assert!(selector.select("hello", &index()).await.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_response_degrades_to_empty() {
        let reasoner = Arc::new(ScriptedReasoner::new().push_text("Sleep seems relevant."));
        let selector = RelevanceSelector::new(reasoner);

        assert!(selector.select("hello", &index()).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_skips_service() {
        let reasoner = Arc::new(ScriptedReasoner::unavailable());
        let selector = RelevanceSelector::new(reasoner.clone());

        let selection = selector.select("hello", &MemoryIndex::default()).await;
        assert!(selection.is_empty());
        assert_eq!(reasoner.calls(), 0);
    }

    #[test]
    fn test_session_reference_forms() {
        assert_eq!(session_reference(&json!(3)), Some(3));
        assert_eq!(session_reference(&json!("3")), Some(3));
        assert_eq!(session_reference(&json!("session_003")), Some(3));
        assert_eq!(session_reference(&json!("Session 12")), Some(12));
        assert_eq!(session_reference(&json!("latest")), None);
        assert_eq!(session_reference(&json!(-1)), None);
        assert_eq!(session_reference(&json!("-3")), None);
        assert_eq!(session_reference(&json!("session_-3")), None);
        assert_eq!(session_reference(&json!("+3")), None);
        assert_eq!(session_reference(&json!("session 3x")), None);
    }

    #[test]
    fn test_negative_session_reference_dropped() {
        let object = json!({"relevant_sessions": ["-2", "session_-1", "session_002"]});
        let selection = validate_selection(object.as_object().unwrap(), &index());
        assert_eq!(selection.session_indices.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_wrong_field_types_ignored() {
        let object = json!({"relevant_themes": "Anxiety", "relevant_sessions": {"1": true}});
        let selection = validate_selection(object.as_object().unwrap(), &index());
        assert!(selection.is_empty());
    }
}
