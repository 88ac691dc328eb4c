//! Redis Streams queue integration tests.

use reel_models::{GenerateVideoRequest, ReviseVideoRequest, VideoId};
use reel_queue::{GenerateVideoJob, JobQueue, QueueConfig, QueueError, ReviseVideoJob};

fn queue() -> JobQueue {
    dotenvy::dotenv().ok();
    let config = QueueConfig {
        stream_name: "reeltest:jobs".to_string(),
        consumer_group: "reeltest:workers".to_string(),
        dlq_stream_name: "reeltest:dlq".to_string(),
        ..QueueConfig::from_env()
    };
    JobQueue::new(config).expect("Failed to create queue")
}

/// Test job enqueue, consume and ack cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_consume_ack() {
    let queue = queue();
    queue.init().await.expect("Failed to initialize queue");

    let job = GenerateVideoJob::new(GenerateVideoRequest::new("test_user_123", "citrus soda ad"));
    let job_id = job.job_id.clone();
    queue.enqueue_generate(job).await.expect("Failed to enqueue");

    let jobs = queue
        .consume("test-consumer", 1000, 10)
        .await
        .expect("Failed to consume");
    let (message_id, consumed) = jobs
        .iter()
        .find(|(_, j)| j.job_id() == &job_id)
        .expect("Enqueued job not consumed");

    queue.ack(message_id).await.expect("Failed to ack");
    queue.clear_dedup(consumed).await.expect("Failed to clear dedup");
}

/// The same request cannot be queued twice while its dedup key lives.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_duplicate_revision_rejected() {
    let queue = queue();
    queue.init().await.expect("Failed to initialize queue");

    let request = ReviseVideoRequest::new(VideoId::new(), "test_user_123", "warmer tone");
    queue
        .enqueue_revise(ReviseVideoJob::new(request.clone()))
        .await
        .expect("Failed to enqueue");

    let second = queue.enqueue_revise(ReviseVideoJob::new(request)).await;
    assert!(matches!(second, Err(QueueError::Duplicate(_))));
}

/// Test retry counter and DLQ move.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_retry_then_dlq() {
    let queue = queue();
    queue.init().await.expect("Failed to initialize queue");

    let job = GenerateVideoJob::new(GenerateVideoRequest::new("test_user_123", "sneaker launch"));
    queue.enqueue_generate(job).await.expect("Failed to enqueue");
    let jobs = queue.consume("test-consumer", 1000, 10).await.expect("Failed to consume");
    let (message_id, job) = jobs.into_iter().next().expect("No job consumed");

    assert_eq!(queue.increment_retry(&message_id).await.unwrap(), 1);
    assert_eq!(queue.get_retry_count(&message_id).await.unwrap(), 1);

    let before = queue.stats().await.unwrap();
    queue.dlq(&message_id, &job, "store unavailable").await.expect("Failed to DLQ");
    let after = queue.stats().await.unwrap();
    assert_eq!(after.dead_lettered, before.dead_lettered + 1);
    assert_eq!(queue.get_retry_count(&message_id).await.unwrap(), 0);
}
