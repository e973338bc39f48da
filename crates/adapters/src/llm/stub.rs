//! Stub generator for offline mode and tests

use async_trait::async_trait;
use draftsmith_domain::{GenerateError, Generation, GenerationRequest, TextGenerator};

/// Deterministic generator that never touches the network.
///
/// In echo mode the output is derived from the prompt, short enough to pass
/// every platform limit, so the full pipeline can be exercised offline.
pub struct StubGenerator {
    response: Option<String>,
    fail: bool,
}

impl StubGenerator {
    /// Echo mode: derive a short deterministic response from the prompt
    pub fn echo() -> Self {
        Self {
            response: None,
            fail: false,
        }
    }

    /// Always return the given text
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            fail: false,
        }
    }

    /// Always fail with an API error
    pub fn failing() -> Self {
        Self {
            response: None,
            fail: true,
        }
    }
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerateError> {
        if self.fail {
            return Err(GenerateError::Api("stub generator failure".to_string()));
        }

        let text = match &self.response {
            Some(text) => text.clone(),
            None => {
                // Last non-empty prompt line, clipped well under the tightest
                // platform limit
                let tail = request
                    .prompt
                    .lines()
                    .rev()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or("stub output")
                    .trim();
                tail.chars().take(200).collect()
            }
        };

        Ok(Generation {
            text,
            provider: self.name().to_string(),
            model: request.model.clone(),
            input_tokens: (request.prompt.len() / 4) as i64,
            output_tokens: 16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_domain::Stage;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            stage: Stage::DraftX,
            model: "stub-small".to_string(),
            system: String::new(),
            prompt: prompt.to_string(),
            temperature: 0.0,
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_echo_stays_under_tightest_limit() {
        let generator = StubGenerator::echo();
        let long_line = "a".repeat(5000);
        let generation = generator.generate(&request(&long_line)).await.unwrap();
        assert!(generation.text.chars().count() <= 200);
        assert_eq!(generation.provider, "stub");
    }

    #[tokio::test]
    async fn test_fixed_response() {
        let generator = StubGenerator::with_text("fixed");
        let generation = generator.generate(&request("anything")).await.unwrap();
        assert_eq!(generation.text, "fixed");
    }

    #[tokio::test]
    async fn test_failing_stub() {
        let generator = StubGenerator::failing();
        let result = generator.generate(&request("anything")).await;
        assert!(matches!(result, Err(GenerateError::Api(_))));
    }
}
