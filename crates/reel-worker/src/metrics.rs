//! Pipeline run metrics.

use metrics::{counter, histogram};
use reel_models::{RunOutcome, Stage, StageStatus};

pub mod names {
    /// Total finished runs by operation (generate, revise) and status.
    pub const RUNS_TOTAL: &str = "pipeline_runs_total";

    /// Wall-clock duration of a run, in seconds.
    pub const RUN_DURATION_SECONDS: &str = "pipeline_run_duration_seconds";

    /// Total stage reports by stage and status (completed, degraded, skipped, failed).
    pub const STAGE_OUTCOMES_TOTAL: &str = "pipeline_stage_outcomes_total";
}

pub fn record_run(operation: &'static str, outcome: &RunOutcome, duration_secs: f64) {
    let status = if outcome.is_completed() { "completed" } else { "failed" };
    counter!(
        names::RUNS_TOTAL,
        "operation" => operation,
        "status" => status
    )
    .increment(1);

    histogram!(names::RUN_DURATION_SECONDS, "operation" => operation).record(duration_secs);
}

pub fn record_stage(stage: Stage, status: StageStatus) {
    counter!(
        names::STAGE_OUTCOMES_TOTAL,
        "stage" => stage.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
}
