//! Scripted reasoning service for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ReasoningRequest, ReasoningResponse, ReasoningService};
use crate::error::ReasoningError;

/// Replays queued responses in order and records every request.
///
/// When the queue is empty it returns the repeating response if one was set,
/// otherwise `ReasoningError::Unavailable`.
#[derive(Default)]
pub struct ScriptedReasoner {
    queue: Mutex<VecDeque<Result<ReasoningResponse, ReasoningError>>>,
    repeating: Option<ReasoningResponse>,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that is always down
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Answer every request with the same JSON
    pub fn repeating_json(value: Value) -> Self {
        Self {
            repeating: Some(ReasoningResponse::Structured(value)),
            ..Self::default()
        }
    }

    pub fn push_json(self, value: Value) -> Self {
        self.push(Ok(ReasoningResponse::Structured(value)))
    }

    pub fn push_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ReasoningResponse::Text(text.into())))
    }

    pub fn push_error(self, error: ReasoningError) -> Self {
        self.push(Err(error))
    }

    fn push(self, item: Result<ReasoningResponse, ReasoningError>) -> Self {
        self.queue.lock().expect("queue lock").push_back(item);
        self
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn reason(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasoningError> {
        self.requests.lock().expect("requests lock").push(request);

        if let Some(item) = self.queue.lock().expect("queue lock").pop_front() {
            return item;
        }
        match &self.repeating {
            Some(response) => Ok(response.clone()),
            None => Err(ReasoningError::unavailable("no scripted response")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
