//! Error types for memoir-core.

use thiserror::Error;

use crate::types::ClientId;

/// Result type alias using memoir-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for memory operations
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced session or client is absent. Recoverable; the caller decides.
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// An on-disk document failed to parse. Never repaired silently.
    #[error("corrupt state for client {client_id}: {detail}")]
    CorruptState { client_id: ClientId, detail: String },

    /// Reasoning service failure. Callers degrade instead of propagating.
    #[error("reasoning service error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    #[error("invalid state transition: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a corrupt state error for a client
    pub fn corrupt(client_id: &ClientId, detail: impl Into<String>) -> Self {
        Self::CorruptState {
            client_id: client_id.clone(),
            detail: detail.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error reports corrupt on-disk state
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptState { .. })
    }
}

/// Failures of the external reasoning service.
///
/// Every variant is recoverable: retrieval degrades to a profile-only context
/// and extraction degrades to summary-only persistence.
#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("reasoning service unavailable: {0}")]
    Unavailable(String),

    #[error("reasoning service timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("reasoning service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed reasoning output: {0}")]
    Malformed(String),
}

impl ReasoningError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let client = ClientId::new("client_ab12").unwrap();

        let err = Error::not_found("Session", "3");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Session"));
        assert!(err.to_string().contains('3'));

        let err = Error::corrupt(&client, "profile.json: expected value at line 1");
        assert!(err.is_corrupt());
        assert!(err.to_string().contains("client_ab12"));
        assert!(err.to_string().contains("profile.json"));
    }

    #[test]
    fn test_reasoning_error_wraps() {
        let err: Error = ReasoningError::Timeout { duration_ms: 5000 }.into();
        assert!(err.to_string().contains("5000"));
        assert!(!err.is_not_found());

        assert!(ReasoningError::Timeout { duration_ms: 1 }.is_timeout());
        assert!(!ReasoningError::malformed("no json").is_timeout());
    }
}
