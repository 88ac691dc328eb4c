//! Remote task metrics.
//!
//! Provides standardized metrics for monitoring remote work:
//! - Submissions by kind and outcome
//! - Status checks by kind
//! - Terminal outcomes and wait time by kind

use metrics::{counter, histogram};
use reel_models::TaskKind;

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total task submissions by kind and outcome.
    pub const SUBMITTED_TOTAL: &str = "remote_tasks_submitted_total";

    /// Total status checks by kind.
    pub const POLLS_TOTAL: &str = "remote_task_polls_total";

    /// Total poll-loop outcomes by kind (success, failed, timeout).
    pub const OUTCOMES_TOTAL: &str = "remote_task_outcomes_total";

    /// Time from first status check to terminal outcome, in seconds.
    pub const WAIT_SECONDS: &str = "remote_task_wait_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_submission(kind: TaskKind, outcome: &'static str) {
    counter!(
        names::SUBMITTED_TOTAL,
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_poll(kind: TaskKind) {
    counter!(names::POLLS_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record how a poll loop ended and how long it took.
pub fn record_outcome(kind: TaskKind, outcome: &'static str, wait_secs: f64) {
    counter!(
        names::OUTCOMES_TOTAL,
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(names::WAIT_SECONDS, "kind" => kind.as_str()).record(wait_secs);
}
