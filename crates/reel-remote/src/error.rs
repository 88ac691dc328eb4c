//! Remote client error types.
//!
//! The taxonomy separates what the caller may retry (transport trouble) from
//! what it must not (local validation, remote rejection, remote failure,
//! exhausted deadline).

use std::time::Duration;

use reel_models::{FailureKind, StageFailure, TaskId};
use thiserror::Error;

/// Malformed task parameters. Raised before any network call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: String },

    #[error("{field} is not an http(s) URL: {value}")]
    InvalidUrl { field: String, value: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: String, value: f64, min: f64, max: f64 },

    #[error("{field} exceeds {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{left} has {left_len} entries but {right} has {right_len}")]
    LengthMismatch {
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },
}

impl ValidationError {
    pub fn empty(field: impl Into<String>) -> Self {
        Self::Empty { field: field.into() }
    }
}

/// Trouble talking to the remote system. Retryable within a poll loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        Self::Server { status, body: body.into() }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::MalformedResponse(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Submission did not yield a task id.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Submission rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl SubmitError {
    /// Only transport trouble is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Transport(_))
    }
}

/// Poll loop ended without a result URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// The remote system reported a terminal failure.
    #[error("Remote task {task_id} failed: {message}")]
    RemoteFailure { task_id: TaskId, message: String },

    /// No terminal status before the deadline. The task may still finish remotely.
    #[error("Remote task {task_id} timed out after {elapsed:?} ({checks} status checks)")]
    TimedOut {
        task_id: TaskId,
        elapsed: Duration,
        checks: u32,
    },
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::TimedOut { .. })
    }
}

/// Submit-then-poll failure for one remote task.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Poll(#[from] PollError),
}

impl TaskError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TaskError::Submit(SubmitError::Validation(_)) => FailureKind::Validation,
            TaskError::Submit(SubmitError::Rejected { .. }) => FailureKind::Rejected,
            TaskError::Submit(SubmitError::Transport(_)) => FailureKind::Unavailable,
            TaskError::Poll(PollError::RemoteFailure { .. }) => FailureKind::RemoteFailure,
            TaskError::Poll(PollError::TimedOut { .. }) => FailureKind::TimedOut,
        }
    }

    pub fn to_failure(&self) -> StageFailure {
        StageFailure::new(self.failure_kind(), self.to_string())
    }
}

/// Invalid client configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("HTTP client construction failed: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_error_retryable() {
        assert!(SubmitError::Transport(TransportError::Timeout).is_retryable());
        assert!(!SubmitError::Validation(ValidationError::empty("text")).is_retryable());
        assert!(!SubmitError::Rejected { status: 413, body: "too large".into() }.is_retryable());
    }

    #[test]
    fn test_task_error_failure_kind() {
        let timeout = TaskError::Poll(PollError::TimedOut {
            task_id: TaskId::from("t"),
            elapsed: Duration::from_secs(600),
            checks: 120,
        });
        assert_eq!(timeout.failure_kind(), FailureKind::TimedOut);

        let remote = TaskError::Poll(PollError::RemoteFailure {
            task_id: TaskId::from("t"),
            message: "ffmpeg exited 1".into(),
        });
        let failure = remote.to_failure();
        assert_eq!(failure.kind, FailureKind::RemoteFailure);
        assert!(failure.message.contains("ffmpeg exited 1"));
    }
}
