//! Reasoning service interface.
//!
//! The reasoning service is the external language-model capability used for
//! relevance selection and session extraction. It is treated as a fallible
//! oracle: every response is untrusted and must be validated by the caller
//! before anything derived from it reaches persistent memory or the context.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ReasoningError;

#[cfg(feature = "client")]
mod openai;
#[cfg(feature = "client")]
pub use openai::OpenAiReasoner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// What the service is being asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasoningMode {
    /// Pick relevant themes/sessions for the current message
    RetrievalSelection,
    /// Extract facts, themes and a summary from a finished session
    Extraction,
}

impl ReasoningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetrievalSelection => "retrieval_selection",
            Self::Extraction => "extraction",
        }
    }
}

/// A single request to the reasoning service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningRequest {
    pub mode: ReasoningMode,
    /// Role/instructions for the model
    pub system: String,
    /// The rendered task prompt
    pub prompt: String,
}

/// Raw service output
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningResponse {
    /// Already-structured JSON
    Structured(Value),
    /// Free text that should contain a JSON object
    Text(String),
}

impl ReasoningResponse {
    /// Parse the response into a JSON object.
    ///
    /// Free text may wrap the object in a Markdown code fence or surround it
    /// with prose; anything that does not yield an object is `Malformed`.
    pub fn into_object(self) -> Result<serde_json::Map<String, Value>, ReasoningError> {
        let value = match self {
            Self::Structured(value) => value,
            Self::Text(text) => parse_json_text(&text)?,
        };

        match value {
            Value::Object(map) => Ok(map),
            other => Err(ReasoningError::malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Generic reasoning service trait for provider abstraction
///
/// Implementations must not retry on their own: extraction is not idempotent
/// from the caller's point of view, so retry policy belongs to the caller.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Run one request
    async fn reason(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasoningError>;

    /// Model or backend identifier, for logs
    fn name(&self) -> &str;
}

fn parse_json_text(text: &str) -> Result<Value, ReasoningError> {
    let trimmed = strip_code_fence(text.trim());
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| ReasoningError::malformed(format!("embedded JSON did not parse: {e}"))),
        _ => Err(ReasoningError::malformed("no JSON object in response text")),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_object() {
        let response = ReasoningResponse::Structured(json!({"relevant_themes": ["Sleep"]}));
        let map = response.into_object().unwrap();
        assert_eq!(map["relevant_themes"], json!(["Sleep"]));
    }

    #[test]
    fn test_text_with_code_fence() {
        let text = "```json\n{\"session_summary\": \"Talked about work\"}\n```";
        let map = ReasoningResponse::Text(text.into()).into_object().unwrap();
        assert_eq!(map["session_summary"], json!("Talked about work"));
    }

    #[test]
    fn test_text_with_surrounding_prose() {
        let text = "Here you go: {\"relevant_sessions\": [1, 2]} hope that helps";
        let map = ReasoningResponse::Text(text.into()).into_object().unwrap();
        assert_eq!(map["relevant_sessions"], json!([1, 2]));
    }

    #[test]
    fn test_malformed_outputs() {
        assert!(ReasoningResponse::Text("I could not decide.".into()).into_object().is_err());
        assert!(ReasoningResponse::Text("{\"a\": ".into()).into_object().is_err());
        assert!(ReasoningResponse::Structured(json!(["not", "an", "object"])).into_object().is_err());
    }
}
