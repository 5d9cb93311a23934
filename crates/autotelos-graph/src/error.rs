use uuid::Uuid;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph store unreachable at {path}: {source}")]
    Unreachable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("session pool error: {0}")]
    Pool(String),

    #[error("goal not found: {0}")]
    GoalNotFound(Uuid),

    #[error("goal already fulfilled: {0}")]
    AlreadyFulfilled(Uuid),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl GraphError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
