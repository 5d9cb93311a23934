//! OpenAI-compatible chat completions client with client-side rate limiting

use crate::limiter::RateLimiter;
use crate::provider::{GenerateOptions, Generator, LlmError, LlmResult};
use crate::types::{ChatMessage, ChatRequest, ChatResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for [`GenerationClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Default model used when a call does not override it.
    pub model: String,
    /// Minimum seconds between two outbound calls.
    pub min_interval_secs: f64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            min_interval_secs: 8.0,
            timeout_secs: 120,
        }
    }
}

pub struct GenerationClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    limiter: RateLimiter,
}

impl GenerationClient {
    /// Build a client. Fails if the key is empty or the HTTP client cannot
    /// be constructed; callers treat this as fatal at startup.
    pub fn new(api_key: impl Into<String>, config: &GenerationConfig) -> LlmResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("api key is empty".into()));
        }
        if !config.min_interval_secs.is_finite() || config.min_interval_secs < 0.0 {
            return Err(LlmError::Config(format!(
                "min_interval_secs must be a non-negative number, got {}",
                config.min_interval_secs
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            limiter: RateLimiter::new(Duration::from_secs_f64(config.min_interval_secs)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl Generator for GenerationClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> LlmResult<String> {
        self.limiter.acquire().await;

        let body = ChatRequest {
            model: options.model.unwrap_or_else(|| self.model.clone()),
            messages: vec![ChatMessage::user(prompt)],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(
            "generate: model={} temperature={:.2} max_tokens={}",
            body.model, body.temperature, body.max_tokens
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("generation error {}: {}", status, error_text);
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Auth(error_text),
                429 => LlmError::RateLimited(error_text),
                code => LlmError::Http {
                    status: code,
                    body: error_text,
                },
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        match parsed.first_content() {
            Some(content) => Ok(content.to_string()),
            None => Err(LlmError::EmptyResponse),
        }
    }
}
