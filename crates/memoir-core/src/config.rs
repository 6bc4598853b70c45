//! Core configuration
//!
//! Defines configuration options for the memory store, the reasoning service
//! client, and the extraction/merge step.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoirConfig {
    /// Root directory holding one subdirectory per client
    pub data_dir: PathBuf,

    /// Reasoning service configuration
    pub reasoning: ReasoningConfig,

    /// Extraction and merge configuration
    pub extraction: ExtractionConfig,
}

impl Default for MemoirConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/clients"),
            reasoning: ReasoningConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

/// Reasoning service (OpenAI-compatible Responses API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Base URL of the API (default: https://api.openai.com/v1)
    pub api_base: String,

    /// API key; usually supplied through the environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for retrieval selection and extraction (default: gpt-5-mini)
    pub model: String,

    /// Reasoning effort hint, only sent to gpt-5 models (default: low)
    pub reasoning_effort: String,

    /// Verbosity hint, only sent to gpt-5 models (default: medium)
    pub verbosity: String,

    /// Per-request timeout in seconds. None leaves timeouts to the caller.
    pub timeout_secs: Option<u64>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-5-mini".to_string(),
            reasoning_effort: "low".to_string(),
            verbosity: "medium".to_string(),
            timeout_secs: None,
        }
    }
}

/// Extraction and merge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum characters of the first client turn used as a fallback summary (default: 200)
    pub fallback_summary_chars: usize,

    /// Number of profile facts included in the retrieval prompt (default: 3)
    pub profile_summary_facts: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fallback_summary_chars: 200,
            profile_summary_facts: 3,
        }
    }
}

impl MemoirConfig {
    /// Create a config rooted at the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set reasoning configuration
    pub fn with_reasoning(mut self, reasoning: ReasoningConfig) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Set extraction configuration
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingDataDir);
        }

        if self.reasoning.model.trim().is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "reasoning.model".into(),
                message: "must not be empty".into(),
            });
        }

        if !self.reasoning.api_base.starts_with("http://")
            && !self.reasoning.api_base.starts_with("https://")
        {
            return Err(ConfigValidationError::InvalidValue {
                field: "reasoning.api_base".into(),
                message: "must be an http(s) URL".into(),
            });
        }

        if self.reasoning.timeout_secs == Some(0) {
            return Err(ConfigValidationError::InvalidValue {
                field: "reasoning.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.extraction.fallback_summary_chars == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "extraction.fallback_summary_chars".into(),
                message: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("data_dir is required")]
    MissingDataDir,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MemoirConfig::default();
        assert_eq!(config.reasoning.model, "gpt-5-mini");
        assert_eq!(config.extraction.fallback_summary_chars, 200);
        assert!(config.reasoning.timeout_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MemoirConfig::new("");
        assert!(matches!(config.validate(), Err(ConfigValidationError::MissingDataDir)));

        config.data_dir = PathBuf::from("/tmp/memoir");
        config.reasoning.timeout_secs = Some(0);
        assert!(config.validate().is_err());

        config.reasoning.timeout_secs = Some(30);
        config.reasoning.api_base = "api.openai.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: MemoirConfig = serde_json::from_str(r#"{"reasoning": {"model": "gpt-4o-mini"}}"#).unwrap();
        assert_eq!(config.reasoning.model, "gpt-4o-mini");
        assert_eq!(config.reasoning.verbosity, "medium");
        assert_eq!(config.data_dir, PathBuf::from("data/clients"));
    }
}
