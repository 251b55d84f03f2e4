//! Chat-completion client with model fallback.

use std::time::Duration;

use reqwest::Client;

use super::types::{ChatMessage, ChatRequest, ChatResponse};

/// Error from a single model attempt.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// HTTP request failed (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error: {status} - {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The model returned no text.
    #[error("empty completion")]
    EmptyContent,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Outcome of a completion request across all models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A model answered.
    Text {
        /// The model that produced the answer.
        model: String,
        /// Trimmed answer text.
        text: String,
    },
    /// Every model failed.
    Unavailable,
}

/// OpenAI-compatible chat-completion client.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
    api_key: String,
    models: Vec<String>,
}

const MAX_ERROR_BODY: usize = 500;

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

impl AiClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API base, e.g. `"https://openrouter.ai/api/v1"`
    /// * `api_key` - Bearer token
    /// * `models` - model ids, primary first
    /// * `timeout` - per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `AiError::Configuration` if `models` is empty or the HTTP
    /// client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        if models.is_empty() {
            return Err(AiError::Configuration("no models configured".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models,
        })
    }

    /// Configured models, in the order they are tried.
    #[must_use]
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Ask each model in turn until one returns non-empty text.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Completion {
        for model in &self.models {
            match self
                .complete_with(model, system_prompt, user_prompt, temperature)
                .await
            {
                Ok(text) => {
                    tracing::debug!(model = %model, "Completion succeeded");
                    return Completion::Text {
                        model: model.clone(),
                        text,
                    };
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Model failed, trying next");
                }
            }
        }

        tracing::warn!(models = self.models.len(), "All models failed");
        Completion::Unavailable
    }

    async fn complete_with(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(AiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ChatResponse>()
            .await?
            .text()
            .ok_or(AiError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn answer(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
    }

    fn client(server: &MockServer, models: &[&str]) -> AiClient {
        AiClient::new(
            server.uri(),
            "test-key",
            models.iter().map(|m| (*m).to_string()).collect(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = AiClient::new(
            "http://localhost",
            "sk-secret",
            vec!["m".into()],
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }

    #[test]
    fn empty_model_list_is_rejected() {
        let result = AiClient::new("http://localhost", "k", Vec::new(), Duration::from_secs(1));
        assert!(matches!(result, Err(AiError::Configuration(_))));
    }

    #[tokio::test]
    async fn primary_model_answers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({ "model": "primary" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("  Eat greens.  ")))
            .expect(1)
            .mount(&server)
            .await;

        let completion = client(&server, &["primary", "backup"])
            .complete("system", "question", 0.7)
            .await;

        assert_eq!(
            completion,
            Completion::Text {
                model: "primary".into(),
                text: "Eat greens.".into(),
            }
        );
    }

    #[tokio::test]
    async fn falls_back_on_error_and_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "broken" })))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "silent" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("   ")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "working" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("Drink water.")))
            .mount(&server)
            .await;

        let completion = client(&server, &["broken", "silent", "working"])
            .complete("system", "question", 0.7)
            .await;

        assert_eq!(
            completion,
            Completion::Text {
                model: "working".into(),
                text: "Drink water.".into(),
            }
        );
    }

    #[tokio::test]
    async fn unavailable_when_every_model_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let completion = client(&server, &["a", "b"])
            .complete("system", "question", 0.7)
            .await;

        assert_eq!(completion, Completion::Unavailable);
    }
}
