//! Poll loop driving a submitted task to a terminal outcome.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use reel_models::{RemoteStatus, RemoteTask, TaskId, TaskKind};

use crate::client::RemoteTaskClient;
use crate::error::{PollError, TaskError};
use crate::metrics::{record_outcome, record_poll};
use crate::params::TaskParams;

/// Default interval between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default deadline for one remote task.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Fixed-interval poller with a deadline.
///
/// The poller takes the [`RemoteTask`] by value, so exactly one loop owns a
/// task until it is terminal. Sleeps suspend the calling task only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_WAIT)
    }
}

impl Poller {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Poll until the task succeeds, fails, or the deadline passes.
    ///
    /// The first status check happens immediately. Transport errors are
    /// logged and the loop keeps going; only a remote `failed` status or the
    /// deadline end it without a URL.
    pub async fn wait(
        &self,
        client: &dyn RemoteTaskClient,
        mut task: RemoteTask,
    ) -> Result<String, PollError> {
        let started = Instant::now();
        let mut checks: u32 = 0;

        loop {
            checks += 1;
            record_poll(task.kind);

            let remaining = self.max_wait.saturating_sub(started.elapsed());
            match tokio::time::timeout(remaining, client.fetch_status(&task.id, task.kind)).await {
                Ok(Ok(snapshot)) => {
                    task.observe(snapshot);
                    match task.status {
                        RemoteStatus::Success => {
                            let url = task.result_url.take().unwrap_or_default();
                            info!(
                                task_id = %task.id,
                                kind = %task.kind,
                                checks,
                                "Remote task succeeded"
                            );
                            record_outcome(task.kind, "success", started.elapsed().as_secs_f64());
                            return Ok(url);
                        }
                        RemoteStatus::Failed => {
                            let message = task.error_message.take().unwrap_or_default();
                            warn!(
                                task_id = %task.id,
                                kind = %task.kind,
                                error = %message,
                                "Remote task failed"
                            );
                            record_outcome(task.kind, "failed", started.elapsed().as_secs_f64());
                            return Err(PollError::RemoteFailure { task_id: task.id, message });
                        }
                        status => {
                            debug!(task_id = %task.id, status = %status, "Remote task in progress");
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(task_id = %task.id, kind = %task.kind, error = %e, "Status check failed, will retry");
                }
                Err(_) => {
                    warn!(task_id = %task.id, kind = %task.kind, "Status check exceeded the remaining wait budget");
                }
            }

            if started.elapsed() >= self.max_wait {
                return Err(self.timed_out(task.id, task.kind, started, checks));
            }
            tokio::time::sleep(self.interval).await;
            if started.elapsed() >= self.max_wait {
                return Err(self.timed_out(task.id, task.kind, started, checks));
            }
        }
    }

    fn timed_out(
        &self,
        task_id: TaskId,
        kind: TaskKind,
        started: Instant,
        checks: u32,
    ) -> PollError {
        let elapsed = started.elapsed();
        warn!(
            task_id = %task_id,
            kind = %kind,
            elapsed_secs = elapsed.as_secs(),
            checks,
            "Remote task timed out; it may still complete remotely"
        );
        record_outcome(kind, "timeout", elapsed.as_secs_f64());
        PollError::TimedOut { task_id, elapsed, checks }
    }

    /// Submit `params` and poll the resulting task to completion.
    pub async fn run(
        &self,
        client: &dyn RemoteTaskClient,
        params: &TaskParams,
    ) -> Result<String, TaskError> {
        let task_id = client.submit(params).await?;
        let task = RemoteTask::submitted(task_id, params.kind());
        Ok(self.wait(client, task).await?)
    }
}
