//! Backend error types.

use thiserror::Error;

/// Errors that can occur while talking to an inference backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend is not reachable or not loaded.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The completion request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The backend returned something that could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The prompt does not fit in the model's context window.
    #[error("context length exceeded: {current} tokens, max is {max}")]
    ContextLengthExceeded {
        /// Current token count.
        current: usize,
        /// Maximum allowed.
        max: usize,
    },
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
