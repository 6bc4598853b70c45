//! Memory Manager
//!
//! Orchestrates the store, the relevance selector and the extractor into the
//! two operations the conversation loop calls:
//!
//! - `prepare_context` every turn (read-only, idempotent)
//! - `finalize_session` once per session (appends; not idempotent)
//!
//! Reasoning-service failures never escape either operation. Storage errors,
//! corruption in particular, abort the current client's operation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::extractor::{self, Extractor};
use crate::prompts;
use crate::reasoning::ReasoningService;
use crate::selector::RelevanceSelector;
use crate::session::{ActiveSession, SessionPhase};
use crate::store::MemoryStore;
use crate::types::{
    ClientId, ContextBundle, FinalizationReport, MemoryIndex, NewSession, Turn,
};

/// Per-process memory manager. Holds no per-client state between calls.
pub struct MemoryManager {
    store: Arc<dyn MemoryStore>,
    selector: RelevanceSelector,
    extractor: Extractor,
    config: ExtractionConfig,
}

impl MemoryManager {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        service: Arc<dyn ReasoningService>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            store,
            selector: RelevanceSelector::new(service.clone()),
            extractor: Extractor::new(service),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Derived index of theme titles/statuses and session summaries
    pub fn memory_index(&self, client: &ClientId) -> Result<MemoryIndex> {
        let themes = self.store.load_theme_index(client)?;
        let sessions = self.store.load_session_index(client)?;
        Ok(MemoryIndex::new(&themes, sessions))
    }

    /// Assemble the memory to load for one turn.
    ///
    /// The profile is always included. Themes and sessions are included when
    /// the selector judges them relevant; if selection fails the bundle is
    /// profile-only.
    #[instrument(skip_all, fields(client = %client))]
    pub async fn prepare_context(&self, client: &ClientId, message: &str) -> Result<ContextBundle> {
        let profile = self.store.load_profile(client)?;
        let theme_doc = self.store.load_themes(client)?;
        let themes = self.store.load_theme_index(client)?;
        let index = MemoryIndex::new(&themes, self.store.load_session_index(client)?);

        let summary = prompts::profile_summary(&profile, self.config.profile_summary_facts);
        let selection = self.selector.select_with_profile(message, &summary, &index).await;

        let selected_themes = themes
            .into_iter()
            .filter(|t| selection.theme_titles.contains(&t.title))
            .collect();

        let mut selected_sessions = Vec::with_capacity(selection.session_indices.len());
        for session_index in &selection.session_indices {
            match self.store.load_session(client, *session_index) {
                Ok(record) => selected_sessions.push(record),
                Err(e) if e.is_not_found() => {
                    warn!(session_index, "selected session disappeared, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ContextBundle {
            profile,
            selected_themes,
            selected_sessions,
            progress_markers: theme_doc.progress_markers,
        })
    }

    /// Extract memory from a finished transcript and persist the session.
    ///
    /// Must be called exactly once per session: a second call appends a
    /// second session record.
    pub async fn finalize_session(
        &self,
        client: &ClientId,
        transcript: Vec<Turn>,
    ) -> Result<FinalizationReport> {
        self.finalize_active(ActiveSession::from_transcript(client.clone(), transcript))
            .await
    }

    /// Finalize a session collected with [`ActiveSession`].
    #[instrument(skip_all, fields(client = %session.client_id()))]
    pub async fn finalize_active(&self, mut session: ActiveSession) -> Result<FinalizationReport> {
        session.advance(SessionPhase::Finalizing)?;
        let client = session.client_id().clone();

        let session_index = self.store.next_session_index(&client)?;
        let mut profile = self.store.load_profile(&client)?;
        let mut theme_doc = self.store.load_themes(&client)?;
        let themes = self.store.load_theme_index(&client)?;

        let extraction = self
            .extractor
            .extract(session.transcript(), &profile, &themes)
            .await;

        let (new_session, report) = match extraction {
            Ok(extraction) => {
                session.advance(SessionPhase::Extracted)?;
                let outcome = extractor::merge(&extraction, &mut profile, &mut theme_doc, session_index);

                // Facts and themes are committed before the session that references them
                profile.last_updated = Utc::now();
                self.store.save_profile(&client, &profile)?;
                self.store.save_themes(&client, &theme_doc)?;

                let summary = if extraction.summary.is_empty() {
                    self.config.fallback_summary(session.transcript())
                } else {
                    extraction.summary.clone()
                };

                let new_session = NewSession {
                    started_at: session.started_at(),
                    transcript: session.transcript().to_vec(),
                    summary: summary.clone(),
                    extracted_fact_keys: outcome.fact_keys.clone(),
                    extracted_theme_titles: outcome.theme_titles(),
                    extraction_succeeded: true,
                    important_moments: extraction.important_moments,
                    next_session_focus: extraction.next_session_focus,
                };
                let report = FinalizationReport {
                    session_index,
                    new_facts: outcome.applied_facts,
                    updated_themes: outcome.touched_themes,
                    summary,
                    extraction_succeeded: true,
                    message_count: session.transcript().len(),
                };
                (new_session, report)
            }
            Err(e) => {
                session.advance(SessionPhase::ExtractionFailed)?;
                warn!(error = %e, "extraction failed, persisting session with fallback summary");

                let summary = self.config.fallback_summary(session.transcript());
                let new_session = NewSession {
                    started_at: session.started_at(),
                    transcript: session.transcript().to_vec(),
                    summary: summary.clone(),
                    extraction_succeeded: false,
                    ..Default::default()
                };
                let report = FinalizationReport {
                    session_index,
                    new_facts: Vec::new(),
                    updated_themes: Vec::new(),
                    summary,
                    extraction_succeeded: false,
                    message_count: session.transcript().len(),
                };
                (new_session, report)
            }
        };

        let record = self.store.append_session(&client, new_session)?;
        session.advance(SessionPhase::Persisted)?;
        info!(
            index = record.index,
            extraction_succeeded = report.extraction_succeeded,
            facts = report.new_facts.len(),
            themes = report.updated_themes.len(),
            "session finalized"
        );

        Ok(FinalizationReport {
            session_index: record.index,
            ..report
        })
    }
}
