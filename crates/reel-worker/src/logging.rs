//! Structured run logging.
//!
//! Every lifecycle line for a run carries the video ID and the operation
//! (`generate` or `revise`) as tracing fields.

use tracing::{error, info, warn, Span};

use reel_models::{Stage, VideoId};

/// Run logger with consistent contextual fields.
#[derive(Debug, Clone)]
pub struct RunLogger {
    video_id: String,
    operation: &'static str,
}

impl RunLogger {
    pub fn new(video_id: &VideoId, operation: &'static str) -> Self {
        Self {
            video_id: video_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            operation = self.operation,
            "Run started: {}", message
        );
    }

    /// Log a stage that resolved, with its stage identifier.
    pub fn log_stage(&self, stage: Stage, message: &str) {
        info!(
            video_id = %self.video_id,
            operation = self.operation,
            stage = stage.as_str(),
            "Stage done: {}", message
        );
    }

    pub fn log_warning(&self, stage: Stage, message: &str) {
        warn!(
            video_id = %self.video_id,
            operation = self.operation,
            stage = stage.as_str(),
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, stage: Stage, message: &str) {
        error!(
            video_id = %self.video_id,
            operation = self.operation,
            stage = stage.as_str(),
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            operation = self.operation,
            "Run completed: {}", message
        );
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Span wrapping the whole run, so remote client and poller logs nest under it.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            video_id = %self.video_id,
            operation = self.operation
        )
    }
}
