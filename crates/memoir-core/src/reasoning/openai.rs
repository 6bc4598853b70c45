//! OpenAI-compatible reasoning service over the Responses API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ReasoningRequest, ReasoningResponse, ReasoningService};
use crate::config::{ConfigValidationError, ReasoningConfig};
use crate::error::{Error, ReasoningError, Result};

/// Reasoning service backed by an OpenAI-compatible `/responses` endpoint
#[derive(Clone)]
pub struct OpenAiReasoner {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    reasoning_effort: String,
    verbosity: String,
    timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesBody {
    /// Concatenated `output_text` parts of all message items
    fn text(self) -> Option<String> {
        if let Some(text) = self.output_text.filter(|t| !t.is_empty()) {
            return Some(text);
        }

        let text: String = self
            .output
            .into_iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect();

        (!text.is_empty()).then_some(text)
    }
}

impl OpenAiReasoner {
    /// Build a client from configuration. An API key is required.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigValidationError::InvalidValue {
                field: "reasoning.api_key".into(),
                message: "is required (set OPENAI_API_KEY)".into(),
            })?;

        let timeout = config.timeout_secs.map(Duration::from_secs);
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::Reasoning(ReasoningError::unavailable(format!("failed to create HTTP client: {e}")))
        })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            reasoning_effort: config.reasoning_effort.clone(),
            verbosity: config.verbosity.clone(),
            timeout,
        })
    }

    fn request_body(&self, request: &ReasoningRequest) -> Value {
        let input = format!(
            "{}\n\n{}\n\nRespond with valid JSON only.",
            request.system, request.prompt
        );
        let mut body = json!({
            "model": self.model,
            "input": input,
        });

        // Effort/verbosity hints are only understood by gpt-5 models
        if self.model.starts_with("gpt-5") {
            body["reasoning"] = json!({ "effort": self.reasoning_effort });
            body["text"] = json!({ "verbosity": self.verbosity });
        }
        body
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ReasoningError {
        if e.is_timeout() {
            ReasoningError::Timeout {
                duration_ms: self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0),
            }
        } else {
            ReasoningError::unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl ReasoningService for OpenAiReasoner {
    async fn reason(&self, request: ReasoningRequest) -> std::result::Result<ReasoningResponse, ReasoningError> {
        let url = format!("{}/responses", self.api_base);
        debug!(mode = request.mode.as_str(), model = %self.model, "calling reasoning service");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: ResponsesBody = response
            .json()
            .await
            .map_err(|e| ReasoningError::malformed(format!("unexpected response body: {e}")))?;

        body.text()
            .map(ReasoningResponse::Text)
            .ok_or_else(|| ReasoningError::malformed("response contained no output text"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::ReasoningMode;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_base: &str, model: &str) -> ReasoningConfig {
        ReasoningConfig {
            api_base: api_base.to_string(),
            api_key: Some("sk-test".into()),
            model: model.to_string(),
            ..Default::default()
        }
    }

    fn request() -> ReasoningRequest {
        ReasoningRequest {
            mode: ReasoningMode::RetrievalSelection,
            system: "You decide which past memories are relevant.".into(),
            prompt: "CURRENT USER MESSAGE: I slept badly".into(),
        }
    }

    #[test]
    fn test_api_key_required() {
        let mut cfg = config("https://api.openai.com/v1", "gpt-5-mini");
        cfg.api_key = None;
        assert!(matches!(OpenAiReasoner::from_config(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_effort_hints_only_for_gpt5() {
        let gpt5 = OpenAiReasoner::from_config(&config("http://localhost", "gpt-5-mini")).unwrap();
        let body = gpt5.request_body(&request());
        assert_eq!(body["reasoning"]["effort"], "low");
        assert_eq!(body["text"]["verbosity"], "medium");

        let gpt4 = OpenAiReasoner::from_config(&config("http://localhost", "gpt-4o-mini")).unwrap();
        let body = gpt4.request_body(&request());
        assert!(body.get("reasoning").is_none());
        assert!(body["input"].as_str().unwrap().ends_with("Respond with valid JSON only."));
    }

    #[tokio::test]
    async fn test_collects_output_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-5-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": [
                    {"type": "reasoning", "summary": []},
                    {"type": "message", "content": [
                        {"type": "output_text", "text": "{\"relevant_themes\": "},
                        {"type": "output_text", "text": "[\"Sleep\"]}"}
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let reasoner = OpenAiReasoner::from_config(&config(&server.uri(), "gpt-5-mini")).unwrap();
        let response = reasoner.reason(request()).await.unwrap();
        assert_eq!(
            response,
            ReasoningResponse::Text("{\"relevant_themes\": [\"Sleep\"]}".into())
        );
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let reasoner = OpenAiReasoner::from_config(&config(&server.uri(), "gpt-5-mini")).unwrap();
        let err = reasoner.reason(request()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::Http { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_empty_output_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": []})))
            .mount(&server)
            .await;

        let reasoner = OpenAiReasoner::from_config(&config(&server.uri(), "gpt-5-mini")).unwrap();
        let err = reasoner.reason(request()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::Malformed(_)));
    }
}
