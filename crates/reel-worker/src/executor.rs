//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reel_models::RunOutcome;
use reel_queue::{JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::Pipeline;

const READ_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const SLOT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happens to a message whose job returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Stays pending; claimed again once idle
    AwaitRedelivery,
    DeadLetter,
}

/// `attempts` is the retry count after this failure, `None` when the error
/// is not worth retrying.
fn disposition(attempts: Option<u32>, max_retries: u32) -> Disposition {
    match attempts {
        Some(n) if n < max_retries => Disposition::AwaitRedelivery,
        _ => Disposition::DeadLetter,
    }
}

/// Job executor that feeds queued jobs into the pipeline.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: Arc<Pipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, pipeline: Arc<Pipeline>) -> Self {
        let slots = config.max_concurrent_jobs;
        let config = config.with_max_concurrent_jobs(slots);
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            pipeline,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor and run until [`JobExecutor::shutdown`] is called.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            slots = self.config.max_concurrent_jobs,
            "Job executor starting"
        );

        self.queue.init().await?;

        let mut stop = self.shutdown.subscribe();
        let reclaimer = self.spawn_reclaimer();

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    if *stop.borrow() {
                        info!("Shutdown requested, no new jobs will be read");
                        break;
                    }
                }
                read = self.read_batch() => {
                    if let Err(e) = read {
                        error!(error = %e, "Reading from the job stream failed");
                        tokio::time::sleep(READ_ERROR_BACKOFF).await;
                    }
                }
            }
        }

        reclaimer.abort();

        info!("Draining in-flight runs");
        if tokio::time::timeout(self.config.shutdown_timeout, self.drain())
            .await
            .is_err()
        {
            warn!("Shutdown timeout elapsed with runs still in flight; they will be claimed after restart");
        }

        info!(consumer = %self.consumer_name, "Job executor stopped");
        Ok(())
    }

    /// Hand one job to its own task, holding `permit` until the run is done.
    fn dispatch(
        permit: OwnedSemaphorePermit,
        delivery: Delivery,
        pipeline: &Arc<Pipeline>,
        queue: &Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
    ) {
        let pipeline = Arc::clone(pipeline);
        let queue = Arc::clone(queue);
        tokio::spawn(async move {
            Self::execute_job(pipeline, queue, message_id, job, delivery).await;
            drop(permit);
        });
    }

    /// Periodically take over messages another consumer left idle.
    fn spawn_reclaimer(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let pipeline = Arc::clone(&self.pipeline);
        let slots = Arc::clone(&self.job_semaphore);
        let consumer = self.consumer_name.clone();
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let batch_size = self.queue.config().batch_size;
        let mut ticker = tokio::time::interval(self.config.claim_interval);
        let mut stop = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        let claimed = match queue.claim_pending(&consumer, min_idle_ms, batch_size).await {
                            Ok(claimed) => claimed,
                            Err(e) => {
                                warn!(error = %e, "Claiming idle messages failed");
                                continue;
                            }
                        };
                        if !claimed.is_empty() {
                            info!(count = claimed.len(), "Reclaimed idle messages");
                        }
                        for (message_id, job) in claimed {
                            let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                                return;
                            };
                            Self::dispatch(permit, Delivery::Reclaimed, &pipeline, &queue, message_id, job);
                        }
                    }
                }
            }
        })
    }

    /// Read at most as many jobs as there are free slots and start them.
    async fn read_batch(&self) -> WorkerResult<()> {
        let free = self.job_semaphore.available_permits();
        if free == 0 {
            tokio::time::sleep(SLOT_POLL_INTERVAL).await;
            return Ok(());
        }

        let queue_config = self.queue.config();
        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                queue_config.read_block_ms,
                free.min(queue_config.batch_size),
            )
            .await?;

        if !jobs.is_empty() {
            debug!(count = jobs.len(), "Read jobs from stream");
        }

        for (message_id, job) in jobs {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("job slots closed"))?;
            Self::dispatch(permit, Delivery::Fresh, &self.pipeline, &self.queue, message_id, job);
        }

        Ok(())
    }

    /// Execute a single job with retry and DLQ handling.
    ///
    /// A run that ends in `failed` is a handled result and is acked; only
    /// errors that kept the run from starting are retried.
    async fn execute_job(
        pipeline: Arc<Pipeline>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
        delivery: Delivery,
    ) {
        let job_id = job.job_id().to_string();
        info!(
            job_id = %job_id,
            video_id = %job.video_id(),
            job_type = job.job_type(),
            ?delivery,
            "Executing job"
        );

        let error = match run_job(&pipeline, &job, delivery).await {
            Ok(outcome) => {
                match &outcome {
                    RunOutcome::Completed { final_url, .. } => {
                        info!(job_id = %job_id, final_url = %final_url, "Run completed");
                    }
                    RunOutcome::Failed { stage, message, .. } => {
                        warn!(job_id = %job_id, stage = %stage, "Run failed: {}", message);
                    }
                }
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, error = %e, "Ack failed; the message will be redelivered");
                }
                if let Err(e) = queue.clear_dedup(&job).await {
                    warn!(job_id = %job_id, error = %e, "Dedup key not cleared");
                }
                return;
            }
            Err(e) => e,
        };

        let attempts = if error.is_retryable() {
            Some(queue.increment_retry(&message_id).await.unwrap_or(u32::MAX))
        } else {
            None
        };
        match disposition(attempts, queue.max_retries()) {
            Disposition::AwaitRedelivery => {
                warn!(
                    job_id = %job_id,
                    attempt = attempts.unwrap_or_default(),
                    max_retries = queue.max_retries(),
                    error = %error,
                    "Job left pending for redelivery"
                );
            }
            Disposition::DeadLetter => {
                error!(job_id = %job_id, error = %error, "Job will not be retried");
                Self::dead_letter(&queue, &message_id, &job, &error).await;
            }
        }
    }

    async fn dead_letter(queue: &JobQueue, message_id: &str, job: &QueueJob, error: &WorkerError) {
        let job_id = job.job_id();
        if let Err(e) = queue.dlq(message_id, job, &error.to_string()).await {
            error!(job_id = %job_id, error = %e, "Moving job to the dead letter stream failed");
        }
        // A dead-lettered request may be submitted again.
        if let Err(e) = queue.clear_dedup(job).await {
            warn!(job_id = %job_id, error = %e, "Dedup key not cleared");
        }
    }

    /// Resolves once every job slot is free again.
    async fn drain(&self) {
        let slots = u32::try_from(self.config.max_concurrent_jobs).unwrap_or(u32::MAX);
        // Closed only if the executor is gone, in which case nothing is in flight.
        let _ = self.job_semaphore.acquire_many(slots).await;
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// How a message reached this worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Read from the stream for the first time
    Fresh,
    /// Taken over from a consumer that left it idle past the claim threshold
    Reclaimed,
}

/// Invoke the one pipeline entry point for this job type.
///
/// A reclaimed message whose run is still marked in progress belongs to a
/// worker that is gone; that run is failed rather than started again.
pub async fn run_job(pipeline: &Pipeline, job: &QueueJob, delivery: Delivery) -> WorkerResult<RunOutcome> {
    let result = match job {
        QueueJob::GenerateVideo(j) => pipeline.generate(j.request.clone()).await,
        QueueJob::ReviseVideo(j) => pipeline.revise(j.request.clone()).await,
    };
    match result {
        Err(WorkerError::RunInProgress(video_id)) if delivery == Delivery::Reclaimed => {
            pipeline.resolve_abandoned(&video_id).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition() {
        assert_eq!(disposition(None, 3), Disposition::DeadLetter);
        assert_eq!(disposition(Some(1), 3), Disposition::AwaitRedelivery);
        assert_eq!(disposition(Some(3), 3), Disposition::DeadLetter);
        // Counter unavailable
        assert_eq!(disposition(Some(u32::MAX), 3), Disposition::DeadLetter);
    }
}
