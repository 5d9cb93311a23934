//! Error types shared across Autotelos crates

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("unknown agent kind: {0}")]
    UnknownAgentKind(String),
}

pub type Result<T> = std::result::Result<T, Error>;
