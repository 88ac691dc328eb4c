//! Shared data models for the Reelforge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Remote tasks and their reported status
//! - Scene scripts and per-scene artifacts
//! - Stage results and reports
//! - Pipeline runs, their state machine and outcome
//! - Generation and revision requests

pub mod job;
pub mod request;
pub mod run;
pub mod scene;
pub mod stage;
pub mod task;
pub mod video;

// Re-export common types
pub use job::JobId;
pub use request::{GenerateVideoRequest, ReviseVideoRequest};
pub use run::{PipelineRun, PipelineState, RunError, RunOutcome, RunStatus};
pub use scene::{Scene, SceneArtifacts};
pub use stage::{FailureKind, Stage, StageFailure, StageReport, StageResult, StageStatus};
pub use task::{normalize_result_url, RemoteStatus, RemoteTask, TaskId, TaskKind, TaskSnapshot};
pub use video::{AspectRatio, AspectRatioParseError, VideoId, VideoModel};
