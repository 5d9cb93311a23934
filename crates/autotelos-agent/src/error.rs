use autotelos_graph::GraphError;
use autotelos_llm::{LlmError, ParseError};

pub type AgentResult<T> = Result<T, AgentError>;

/// Everything that can end a cycle early. Never fatal to the agent loop.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("graph: {0}")]
    Graph(#[from] GraphError),

    #[error("generation: {0}")]
    Llm(#[from] LlmError),

    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("unusable model output: {0}")]
    InvalidOutput(String),
}
