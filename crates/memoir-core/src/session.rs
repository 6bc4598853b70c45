//! Session lifecycle.
//!
//! ```text
//! InProgress -> Finalizing -> Extracted        -> Persisted
//!                          -> ExtractionFailed -> Persisted
//! ```
//!
//! Both extraction outcomes reach `Persisted`: a session is stored even when
//! memory extraction fails.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::{ClientId, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    InProgress,
    Finalizing,
    Extracted,
    ExtractionFailed,
    Persisted,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Finalizing => "finalizing",
            Self::Extracted => "extracted",
            Self::ExtractionFailed => "extraction_failed",
            Self::Persisted => "persisted",
        }
    }

    /// Whether `next` is a legal successor of this phase
    pub fn can_advance_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (InProgress, Finalizing)
                | (Finalizing, Extracted)
                | (Finalizing, ExtractionFailed)
                | (Extracted, Persisted)
                | (ExtractionFailed, Persisted)
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A session being recorded by the conversation loop.
///
/// Turns can only be added while the session is in progress. Hand the
/// session to `MemoryManager::finalize_active` exactly once when it ends.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    client_id: ClientId,
    started_at: Option<DateTime<Utc>>,
    transcript: Vec<Turn>,
    phase: SessionPhase,
}

impl ActiveSession {
    /// Start recording now
    pub fn new(client_id: ClientId) -> Self {
        Self::from_transcript(client_id, Vec::new()).with_started_at(Utc::now())
    }

    /// Wrap an already collected transcript; the start time is unknown
    /// unless set with [`with_started_at`](Self::with_started_at).
    pub fn from_transcript(client_id: ClientId, transcript: Vec<Turn>) -> Self {
        Self {
            client_id,
            started_at: None,
            transcript,
            phase: SessionPhase::InProgress,
        }
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Append a turn; fails once finalization has begun.
    pub fn record(&mut self, turn: Turn) -> Result<()> {
        if self.phase != SessionPhase::InProgress {
            return Err(Error::invalid_state(format!(
                "cannot record turns in phase {}",
                self.phase
            )));
        }
        self.transcript.push(turn);
        Ok(())
    }

    pub fn record_user(&mut self, text: impl Into<String>) -> Result<()> {
        self.record(Turn::user(text))
    }

    pub fn record_assistant(&mut self, text: impl Into<String>) -> Result<()> {
        self.record(Turn::assistant(text))
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn advance(&mut self, next: SessionPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::invalid_state(format!("{} -> {}", self.phase, next)));
        }
        tracing::debug!(client = %self.client_id, from = %self.phase, to = %next, "session phase");
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ActiveSession {
        ActiveSession::new(ClientId::new("c1").unwrap())
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = session();
        s.record_user("hello").unwrap();
        s.advance(SessionPhase::Finalizing).unwrap();
        s.advance(SessionPhase::ExtractionFailed).unwrap();
        s.advance(SessionPhase::Persisted).unwrap();
        assert_eq!(s.phase(), SessionPhase::Persisted);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut s = session();
        assert!(s.advance(SessionPhase::Persisted).is_err());
        assert!(s.advance(SessionPhase::Extracted).is_err());

        s.advance(SessionPhase::Finalizing).unwrap();
        assert!(s.advance(SessionPhase::Finalizing).is_err());
        assert!(s.advance(SessionPhase::InProgress).is_err());
    }

    #[test]
    fn test_start_time_only_when_known() {
        assert!(session().started_at().is_some());

        let client = ClientId::new("c1").unwrap();
        let collected = ActiveSession::from_transcript(client.clone(), vec![Turn::user("hi")]);
        assert!(collected.started_at().is_none());

        let start = Utc::now();
        let resumed = ActiveSession::from_transcript(client, vec![]).with_started_at(start);
        assert_eq!(resumed.started_at(), Some(start));
    }

    #[test]
    fn test_no_turns_after_finalizing() {
        let mut s = session();
        s.record_assistant("Welcome.").unwrap();
        s.advance(SessionPhase::Finalizing).unwrap();

        let err = s.record_user("one more thing").unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(s.transcript().len(), 1);
    }
}
