//! Generator trait

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider returned no candidates")]
    EmptyResponse,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Per-call generation options.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Overrides the client's default model when set.
    pub model: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            model: None,
        }
    }
}

impl GenerateOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Anything that turns a prompt into text. Agents only see this trait.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> LlmResult<String>;
}
