pub type EntropyResult<T> = Result<T, EntropyError>;

#[derive(Debug, thiserror::Error)]
pub enum EntropyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("entropy source returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("entropy source reported failure")]
    Rejected,

    #[error("entropy source returned no bytes")]
    Empty,

    #[error("config error: {0}")]
    Config(String),
}
