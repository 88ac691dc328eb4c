//! Redis Streams job queue for pipeline runs.
//!
//! This crate provides:
//! - Job payloads, one per pipeline entry point
//! - Job enqueueing via Redis Streams with idempotency keys
//! - Worker consumption with retry counters and a dead letter stream

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{GenerateVideoJob, QueueJob, ReviseVideoJob};
pub use queue::{JobQueue, QueueConfig, QueueStats};
