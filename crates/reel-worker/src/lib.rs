//! Video pipeline worker.
//!
//! This crate provides:
//! - Scene scripting through an OpenAI-compatible chat API
//! - Stage functions over the remote task client and poller
//! - The pipeline orchestrator for generation and revision runs
//! - A job executor that feeds queued jobs into the orchestrator

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod revision;
pub mod script;
pub mod stages;

pub use config::{PipelineConfig, StageTimeouts, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::{run_job, Delivery, JobExecutor};
pub use logging::RunLogger;
pub use pipeline::{Pipeline, ABANDONED_RUN_MESSAGE};
pub use revision::{RevisionError, RevisionPlan, SceneChange};
pub use script::{OpenAiSceneWriter, SceneBrief, SceneWriter, ScriptConfig, ScriptError};
