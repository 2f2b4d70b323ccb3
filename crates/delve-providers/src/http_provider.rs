//! HTTP generator for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Covers GLM (BigModel), OpenAI, DeepSeek, OpenRouter, vLLM and any other
//! server that speaks the chat completions format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use delve_core::config::ProviderConfig;
use delve_core::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Turn};

use crate::error::ProviderError;
use crate::traits::Generator;

/// Environment variable consulted when the config carries no API key.
pub const FALLBACK_API_KEY_ENV: &str = "GLM_API_KEY";

// ─────────────────────────────────────────────
// HttpGenerator
// ─────────────────────────────────────────────

/// A generator that talks to any OpenAI-compatible HTTP API.
pub struct HttpGenerator {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
    /// Model sent with every request.
    model: String,
    temperature: f64,
    max_tokens: u32,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for HttpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGenerator")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl HttpGenerator {
    /// Create a generator from the provider config.
    ///
    /// The API key comes from the config, falling back to `GLM_API_KEY`.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = if config.is_configured() {
            config.api_key.clone()
        } else {
            std::env::var(FALLBACK_API_KEY_ENV)
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or(ProviderError::MissingApiKey)?
        };

        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpGenerator {
            client,
            api_base: config.api_base.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            extra_headers,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, transcript: &[Turn]) -> Result<String, ProviderError> {
        debug!(model = %self.model, turns = transcript.len(), "calling generator");

        let request_body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: transcript.iter().map(ChatMessage::from).collect(),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            stream: false,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .headers(self.extra_headers.clone())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "HTTP request failed");
                ProviderError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(status = %status, body = %body, "API error");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "generation usage"
            );
        }

        parsed.into_content().ok_or(ProviderError::EmptyChoices)
    }

    fn display_name(&self) -> &str {
        &self.model
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(api_key: &str, api_base: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.to_string(),
            api_base: api_base.to_string(),
            ..ProviderConfig::default()
        }
    }

    fn transcript() -> Vec<Turn> {
        vec![
            Turn::instruction("You are Delve."),
            Turn::user("Hello"),
            Turn::tool_result("<tool_response>\nok\n</tool_response>"),
        ]
    }

    #[test]
    fn test_completions_url_trailing_slash() {
        let generator = HttpGenerator::new(&make_config("key", "https://api.openai.com/v1/")).unwrap();
        assert_eq!(
            generator.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_completions_url_no_trailing_slash() {
        let generator = HttpGenerator::new(&make_config("key", "https://api.openai.com/v1")).unwrap();
        assert_eq!(
            generator.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_extra_headers() {
        let mut headers = HashMap::new();
        headers.insert("X-App-Code".to_string(), "my-app-code".to_string());
        let config = ProviderConfig {
            extra_headers: Some(headers),
            ..make_config("key", "https://example.com/v1")
        };
        let generator = HttpGenerator::new(&config).unwrap();
        assert!(generator.extra_headers.contains_key("x-app-code"));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key-123"))
            .and(body_partial_json(serde_json::json!({
                "model": "glm-4.5-air",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "You are Delve."},
                    {"role": "user", "content": "Hello"},
                    {"role": "user", "content": "<tool_response>\nok\n</tool_response>"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-test",
                "choices": [{
                    "message": { "content": "<answer>hi</answer>" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            })))
            .mount(&mock_server)
            .await;

        let generator = HttpGenerator::new(&make_config("test-key-123", &mock_server.uri())).unwrap();
        let text = generator.generate(&transcript()).await.unwrap();
        assert_eq!(text, "<answer>hi</answer>");
    }

    #[tokio::test]
    async fn test_generate_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit exceeded"))
            .mount(&mock_server)
            .await;

        let generator = HttpGenerator::new(&make_config("key", &mock_server.uri())).unwrap();
        let err = generator.generate(&transcript()).await.unwrap_err();

        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("Rate limit"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-empty",
                "choices": [],
                "usage": null
            })))
            .mount(&mock_server)
            .await;

        let generator = HttpGenerator::new(&make_config("key", &mock_server.uri())).unwrap();
        let err = generator.generate(&transcript()).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyChoices));
    }

    #[tokio::test]
    async fn test_generate_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let generator = HttpGenerator::new(&make_config("key", &mock_server.uri())).unwrap();
        let err = generator.generate(&transcript()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn test_generate_network_error() {
        // Point to a port that's not listening
        let generator = HttpGenerator::new(&make_config("key", "http://127.0.0.1:1")).unwrap();
        let err = generator.generate(&transcript()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
        assert!(err.to_string().contains("HTTP request failed"));
    }
}
