//! Worker error types.

use thiserror::Error;

use reel_models::VideoId;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that keep a job from producing a run outcome at all.
///
/// Stage failures are not errors here; they end a run with
/// [`reel_models::RunOutcome::Failed`].
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Run {0} is already in progress")]
    RunInProgress(VideoId),

    #[error("Store error: {0}")]
    Store(#[from] reel_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error("Remote client error: {0}")]
    Remote(#[from] reel_remote::ConfigError),

    #[error("Scene writer error: {0}")]
    Script(#[from] crate::script::ScriptError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Store(e) => e.is_retryable(),
            WorkerError::Queue(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_store::StoreError;

    #[test]
    fn test_retryable() {
        assert!(WorkerError::from(StoreError::connection_failed("refused")).is_retryable());
        assert!(!WorkerError::RunInProgress(VideoId::from("vid-1")).is_retryable());
        assert!(!WorkerError::config_error("missing key").is_retryable());
    }
}
