#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// `add` was called with no chunks.
    #[error("refusing to add an empty batch")]
    EmptyBatch,

    /// The term model has not been fitted yet, so queries cannot be vectorized.
    #[error("index is not fitted")]
    NotFitted,

    #[error("index lock poisoned: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persisted file failed its version, checksum, or shape checks.
    #[error("corrupt index file: {0}")]
    Corrupt(String),
}

impl<T> From<std::sync::PoisonError<T>> for IndexError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Lock(e.to_string())
    }
}
