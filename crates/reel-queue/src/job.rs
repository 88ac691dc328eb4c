//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reel_models::{GenerateVideoRequest, JobId, ReviseVideoRequest, VideoId};

/// Job to generate a new video from a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    pub request: GenerateVideoRequest,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl GenerateVideoJob {
    pub fn new(request: GenerateVideoRequest) -> Self {
        Self {
            job_id: JobId::new(),
            request,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("generate:{}:{}", self.request.user_id, self.request.video_id)
    }
}

/// Job to revise a completed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviseVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    pub request: ReviseVideoRequest,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl ReviseVideoJob {
    pub fn new(request: ReviseVideoRequest) -> Self {
        Self {
            job_id: JobId::new(),
            request,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!(
            "revise:{}:{}:{}",
            self.request.user_id, self.request.parent_video_id, self.request.video_id
        )
    }
}

/// Queue job envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    GenerateVideo(GenerateVideoJob),
    ReviseVideo(ReviseVideoJob),
}

impl QueueJob {
    /// Get the job ID.
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::GenerateVideo(j) => &j.job_id,
            QueueJob::ReviseVideo(j) => &j.job_id,
        }
    }

    /// Video the job produces.
    pub fn video_id(&self) -> &VideoId {
        match self {
            QueueJob::GenerateVideo(j) => &j.request.video_id,
            QueueJob::ReviseVideo(j) => &j.request.video_id,
        }
    }

    /// Get the idempotency key.
    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::GenerateVideo(j) => j.idempotency_key(),
            QueueJob::ReviseVideo(j) => j.idempotency_key(),
        }
    }

    pub fn job_type(&self) -> &'static str {
        match self {
            QueueJob::GenerateVideo(_) => "generate_video",
            QueueJob::ReviseVideo(_) => "revise_video",
        }
    }
}

impl From<GenerateVideoJob> for QueueJob {
    fn from(job: GenerateVideoJob) -> Self {
        QueueJob::GenerateVideo(job)
    }
}

impl From<ReviseVideoJob> for QueueJob {
    fn from(job: ReviseVideoJob) -> Self {
        QueueJob::ReviseVideo(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_job_envelope() {
        let request = GenerateVideoRequest::new("user-1", "lemonade ad").with_video_id(VideoId::from("vid-1"));
        let job = QueueJob::from(GenerateVideoJob::new(request));

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "generate_video");
        assert_eq!(json["request"]["prompt"], "lemonade ad");

        let parsed: QueueJob = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.job_id(), job.job_id());
        assert_eq!(parsed.video_id().as_str(), "vid-1");
    }

    #[test]
    fn test_idempotency_keys() {
        let generate = GenerateVideoJob::new(
            GenerateVideoRequest::new("user-1", "prompt").with_video_id(VideoId::from("vid-1")),
        );
        assert_eq!(generate.idempotency_key(), "generate:user-1:vid-1");

        let revise = ReviseVideoJob::new(
            ReviseVideoRequest::new(VideoId::from("vid-1"), "user-1", "brighter colors")
                .with_video_id(VideoId::from("vid-2")),
        );
        assert_eq!(revise.idempotency_key(), "revise:user-1:vid-1:vid-2");
        assert_eq!(QueueJob::from(revise).job_type(), "revise_video");
    }
}
