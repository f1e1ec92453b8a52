#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("authentication failed: {0}")]
    AuthError(String),

    #[error("request cancelled")]
    Cancelled,
}

impl LlmError {
    /// Whether another attempt may succeed where this one failed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkFailure(_) | Self::HttpError(_) | Self::MalformedResponse(_) => true,
            Self::AuthError(_) | Self::Cancelled => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::NetworkFailure(format!("request timed out: {e}"))
        } else {
            Self::NetworkFailure(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
