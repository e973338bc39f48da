//! Anthropic Messages API adapter

use async_trait::async_trait;
use draftsmith_domain::{GenerateError, Generation, GenerationRequest, TextGenerator};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anthropic text generator
pub struct AnthropicGenerator {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: SecretString, timeout_secs: u64) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com".to_string(), timeout_secs)
    }

    pub fn with_base_url(api_key: SecretString, base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    r#type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: i64,
    #[serde(default)]
    output_tokens: i64,
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerateError> {
        let payload = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            system: Some(request.system.clone()),
            temperature: Some(request.temperature),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::Api(e.to_string())
                }
            })?;

        if response.status() == 401 || response.status() == 403 {
            return Err(GenerateError::Auth("invalid API key".to_string()));
        }

        if response.status() == 429 {
            return Err(GenerateError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::MalformedResponse(e.to_string()))?;

        let text = api_response
            .content
            .into_iter()
            .filter_map(|c| (c.r#type == "text").then_some(c.text))
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(GenerateError::MalformedResponse(
                "empty response".to_string(),
            ));
        }

        Ok(Generation {
            text: text.trim().to_string(),
            provider: self.name().to_string(),
            model: request.model.clone(),
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_domain::Stage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> GenerationRequest {
        GenerationRequest {
            stage: Stage::Summarize,
            model: "claude-haiku-4-5".to_string(),
            system: "be brief".to_string(),
            prompt: "summarize this".to_string(),
            temperature: 0.4,
            max_tokens: 700,
        }
    }

    #[tokio::test]
    async fn test_generate_success_with_usage() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "content": [
                    {"type": "text", "text": "A condensed "},
                    {"type": "text", "text": "summary."}
                ],
                "usage": {"input_tokens": 42, "output_tokens": 7}
            })))
            .mount(&mock_server)
            .await;

        let generator = AnthropicGenerator::with_base_url(
            SecretString::new("test-key".into()),
            mock_server.uri(),
            30,
        );

        let generation = generator.generate(&sample_request()).await.unwrap();
        assert_eq!(generation.text, "A condensed summary.");
        assert_eq!(generation.provider, "anthropic");
        assert_eq!(generation.model, "claude-haiku-4-5");
        assert_eq!(generation.input_tokens, 42);
        assert_eq!(generation.output_tokens, 7);
    }

    #[tokio::test]
    async fn test_generate_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let generator = AnthropicGenerator::with_base_url(
            SecretString::new("test-key".into()),
            mock_server.uri(),
            30,
        );

        let result = generator.generate(&sample_request()).await;
        assert!(matches!(result, Err(GenerateError::RateLimited)));
    }

    #[tokio::test]
    async fn test_generate_auth_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let generator = AnthropicGenerator::with_base_url(
            SecretString::new("bad-key".into()),
            mock_server.uri(),
            30,
        );

        let result = generator.generate(&sample_request()).await;
        assert!(matches!(result, Err(GenerateError::Auth(_))));
    }

    #[tokio::test]
    async fn test_generate_empty_content_is_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_2",
                "content": [],
                "usage": {"input_tokens": 1, "output_tokens": 0}
            })))
            .mount(&mock_server)
            .await;

        let generator = AnthropicGenerator::with_base_url(
            SecretString::new("test-key".into()),
            mock_server.uri(),
            30,
        );

        let result = generator.generate(&sample_request()).await;
        assert!(matches!(result, Err(GenerateError::MalformedResponse(_))));
    }
}
