//! Result taxonomy surfaced to endpoint callers.

use thiserror::Error;

/// Numeric result codes, for callers that speak the flat taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    ShouldWait,
}

/// Errors returned by endpoint operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Nothing is available yet; no failure occurred.
    #[error("Should wait")]
    ShouldWait,

    #[error("Watcher already registered with this context")]
    AlreadyExists,

    #[error("Watcher not found")]
    NotFound,

    #[error("Endpoint closed while waiting")]
    Cancelled,

    #[error("Deadline exceeded after {0}ms")]
    DeadlineExceeded(u64),
}

impl PipeError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn code(&self) -> ResultCode {
        match self {
            Self::InvalidArgument(_) => ResultCode::InvalidArgument,
            Self::FailedPrecondition(_) => ResultCode::FailedPrecondition,
            Self::ShouldWait => ResultCode::ShouldWait,
            Self::AlreadyExists => ResultCode::AlreadyExists,
            Self::NotFound => ResultCode::NotFound,
            Self::Cancelled => ResultCode::Cancelled,
            Self::DeadlineExceeded(_) => ResultCode::DeadlineExceeded,
        }
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ShouldWait)
    }

    /// Returns true if the caller should treat this as end-of-stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FailedPrecondition(_))
    }
}

/// Flatten an operation result onto the result-code taxonomy.
pub fn result_code<T>(result: &Result<T, PipeError>) -> ResultCode {
    match result {
        Ok(_) => ResultCode::Ok,
        Err(e) => e.code(),
    }
}
