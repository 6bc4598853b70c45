//! memoir-core - Core library for memoir
//!
//! Persistent per-client memory for a conversational assistant:
//!
//! - **store**: File-backed profile, theme and session documents
//! - **selector**: Relevance selection of themes and past sessions
//! - **extractor**: Session extraction and fact/theme merging
//! - **manager**: `prepare_context` / `finalize_session` orchestration
//! - **reasoning**: Reasoning service abstraction and OpenAI client
//! - **session**: Session lifecycle state machine

pub mod config;
pub mod error;
pub mod extractor;
pub mod manager;
pub mod prompts;
pub mod reasoning;
pub mod selector;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{ExtractionConfig, MemoirConfig, ReasoningConfig};
pub use error::{Error, ReasoningError, Result};
pub use manager::MemoryManager;
pub use reasoning::{ReasoningService, ReasoningMode, ReasoningRequest, ReasoningResponse};
pub use session::{ActiveSession, SessionPhase};
pub use store::{FileMemoryStore, MemoryStore};
pub use types::{ClientId, ContextBundle, FinalizationReport, Role, Turn};
