//! Job queue using Redis Streams.
//!
//! One stream carries every pipeline job, read through a consumer group.
//! A job stays pending until the worker acks it, so a crashed worker's jobs
//! can be claimed by another. Jobs that cannot be processed end up in a
//! dead letter stream together with the reason.

use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{GenerateVideoJob, QueueJob, ReviseVideoJob};

/// Idempotency keys expire after one hour.
const DEDUP_TTL_SECS: u64 = 3600;
/// Retry counters expire after one day.
const RETRY_TTL_SECS: i64 = 86400;

/// Stream entry fields.
const FIELD_JOB: &str = "job";
const FIELD_KEY: &str = "key";
const FIELD_ERROR: &str = "error";
const FIELD_ORIGINAL_ID: &str = "original_id";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter stream name
    pub dlq_stream_name: String,
    /// Max retries before a job is dead-lettered
    pub max_retries: u32,
    /// How long one read waits for new entries
    pub read_block_ms: u64,
    /// Most entries taken per read or claim
    pub batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "reel:jobs".to_string(),
            consumer_group: "reel:workers".to_string(),
            dlq_stream_name: "reel:dlq".to_string(),
            max_retries: 3,
            read_block_ms: 1000,
            batch_size: 5,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            read_block_ms: std::env::var("QUEUE_READ_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.read_block_ms),
            batch_size: std::env::var("QUEUE_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.batch_size),
        }
    }
}

/// Snapshot of the queue's backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Entries in the job stream, pending ones included
    pub queued: u64,
    pub dead_lettered: u64,
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Create the stream and consumer group if they do not exist yet.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => info!(
                stream = %self.config.stream_name,
                group = %self.config.consumer_group,
                "Created consumer group"
            ),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "Consumer group already exists");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Queue a video generation.
    pub async fn enqueue_generate(&self, job: GenerateVideoJob) -> QueueResult<String> {
        self.enqueue(QueueJob::GenerateVideo(job)).await
    }

    /// Queue a revision of a completed video.
    pub async fn enqueue_revise(&self, job: ReviseVideoJob) -> QueueResult<String> {
        self.enqueue(QueueJob::ReviseVideo(job)).await
    }

    /// Add a job unless the same request is already queued. Returns the
    /// stream message ID.
    async fn enqueue(&self, job: QueueJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;

        let payload = serde_json::to_string(&job)?;
        let idempotency_key = job.idempotency_key();
        let dedup_key = self.dedup_key(&idempotency_key);

        let claimed: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg(job.job_id().as_str())
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            warn!(key = %idempotency_key, "Duplicate job rejected");
            return Err(QueueError::Duplicate(idempotency_key));
        }

        let added: Result<String, redis::RedisError> = conn
            .xadd(
                &self.config.stream_name,
                "*",
                &[(FIELD_JOB, payload.as_str()), (FIELD_KEY, idempotency_key.as_str())],
            )
            .await;
        let message_id = match added {
            Ok(id) => id,
            Err(e) => {
                // Release the key so the caller can try again.
                conn.del::<_, ()>(&dedup_key).await.ok();
                return Err(QueueError::enqueue_failed(e.to_string()));
            }
        };

        info!(
            job_id = %job.job_id(),
            video_id = %job.video_id(),
            job_type = job.job_type(),
            message_id = %message_id,
            "Enqueued job"
        );
        Ok(message_id)
    }

    /// Read up to `count` new jobs for `consumer_name`, waiting at most
    /// `block_ms` for the first one.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.connection().await?;

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let entries: Vec<StreamId> = reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default();
        Ok(self.decode_entries(entries).await)
    }

    /// Take over jobs another consumer has held for at least `min_idle_ms`.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.connection().await?;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = pending.ids.iter().map(|p| p.id.as_str()).collect();
        let claimed: StreamClaimReply = conn
            .xclaim(
                &self.config.stream_name,
                &self.config.consumer_group,
                consumer_name,
                min_idle_ms,
                &ids,
            )
            .await?;
        debug!(claimed = claimed.ids.len(), consumer = consumer_name, "Claimed idle jobs");

        Ok(self.decode_entries(claimed.ids).await)
    }

    /// Parse stream entries. Entries that do not hold a job are
    /// dead-lettered with their raw fields and skipped.
    async fn decode_entries(&self, entries: Vec<StreamId>) -> Vec<(String, QueueJob)> {
        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries {
            match parse_entry(&entry) {
                Ok(job) => jobs.push((entry.id, job)),
                Err(e) => {
                    warn!(message_id = %entry.id, error = %e, "Dead-lettering malformed job");
                    let raw: Option<String> = entry.get(FIELD_JOB);
                    if let Err(dlq_err) = self
                        .dead_letter(&entry.id, raw.as_deref().unwrap_or_default(), &e.to_string())
                        .await
                    {
                        warn!(message_id = %entry.id, error = %dlq_err, "Failed to dead-letter malformed job");
                    }
                }
            }
        }
        jobs
    }

    /// Mark a job done and drop it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let _: () = conn
            .xack(&self.config.stream_name, &self.config.consumer_group, &[message_id])
            .await?;
        let _: () = conn.xdel(&self.config.stream_name, &[message_id]).await?;
        let _: () = conn.del(self.retry_key(message_id)).await?;

        debug!(message_id, "Acknowledged job");
        Ok(())
    }

    /// Move a job to the dead letter stream with the reason it was given up on.
    pub async fn dlq(&self, message_id: &str, job: &QueueJob, error: &str) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;
        self.dead_letter(message_id, &payload, error).await?;
        warn!(job_id = %job.job_id(), video_id = %job.video_id(), error, "Moved job to DLQ");
        Ok(())
    }

    async fn dead_letter(&self, message_id: &str, payload: &str, error: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .xadd(
                &self.config.dlq_stream_name,
                "*",
                &[(FIELD_JOB, payload), (FIELD_ERROR, error), (FIELD_ORIGINAL_ID, message_id)],
            )
            .await?;
        self.ack(message_id).await
    }

    /// Backlog sizes of the job and dead letter streams.
    pub async fn stats(&self) -> QueueResult<QueueStats> {
        let mut conn = self.connection().await?;
        let queued: u64 = conn.xlen(&self.config.stream_name).await?;
        let dead_lettered: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(QueueStats { queued, dead_lettered })
    }

    pub async fn get_retry_count(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;
        let count: Option<u32> = conn.get(self.retry_key(message_id)).await?;
        Ok(count.unwrap_or(0))
    }

    /// Count one more failed attempt for a message; returns the new count.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;
        let key = self.retry_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, RETRY_TTL_SECS).await?;
        Ok(count)
    }

    /// Clear the idempotency key so the same request can be queued again.
    pub async fn clear_dedup(&self, job: &QueueJob) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.dedup_key(&job.idempotency_key())).await?;
        Ok(())
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    fn dedup_key(&self, idempotency_key: &str) -> String {
        format!("{}:dedup:{}", self.key_namespace(), idempotency_key)
    }

    fn retry_key(&self, message_id: &str) -> String {
        format!("{}:retry:{}", self.key_namespace(), message_id)
    }

    /// Namespace derived from the stream name ("reel:jobs" -> "reel").
    fn key_namespace(&self) -> &str {
        self.config
            .stream_name
            .split(':')
            .next()
            .unwrap_or("reel")
    }
}

fn parse_entry(entry: &StreamId) -> QueueResult<QueueJob> {
    let payload: String = entry.get(FIELD_JOB).ok_or_else(|| QueueError::MalformedEntry {
        message_id: entry.id.clone(),
        reason: "missing job field".into(),
    })?;
    serde_json::from_str(&payload).map_err(|e| QueueError::MalformedEntry {
        message_id: entry.id.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use reel_models::GenerateVideoRequest;

    fn entry(fields: &[(&str, &str)]) -> StreamId {
        let map: HashMap<String, redis::Value> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), redis::Value::BulkString(v.as_bytes().to_vec())))
            .collect();
        StreamId { id: "1700000000000-0".to_string(), map }
    }

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "reel:jobs");
        assert_eq!(config.consumer_group, "reel:workers");
        assert_eq!(config.dlq_stream_name, "reel:dlq");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.batch_size, 5);
    }

    #[test]
    fn test_key_formats() {
        let queue = JobQueue::new(QueueConfig::default()).unwrap();
        assert_eq!(queue.dedup_key("generate:u:v"), "reel:dedup:generate:u:v");
        assert_eq!(queue.retry_key("1700000000000-0"), "reel:retry:1700000000000-0");
    }

    #[test]
    fn test_parse_entry() {
        let job = QueueJob::GenerateVideo(GenerateVideoJob::new(GenerateVideoRequest::new(
            "user-1",
            "citrus soda ad",
        )));
        let payload = serde_json::to_string(&job).unwrap();
        let parsed = parse_entry(&entry(&[(FIELD_JOB, &payload)])).unwrap();
        assert_eq!(parsed.job_id(), job.job_id());

        let missing = parse_entry(&entry(&[(FIELD_KEY, "generate:u:v")])).unwrap_err();
        assert!(matches!(missing, QueueError::MalformedEntry { ref reason, .. } if reason == "missing job field"));

        let garbled = parse_entry(&entry(&[(FIELD_JOB, "{not json")])).unwrap_err();
        assert!(!garbled.is_retryable());
    }
}
