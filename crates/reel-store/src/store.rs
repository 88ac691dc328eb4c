//! Run repository contract.

use async_trait::async_trait;
use reel_models::{PipelineRun, VideoId};

use crate::error::StoreResult;

/// Read/write access to pipeline runs.
///
/// Implementations must give read-after-write consistency for a single run
/// and must refuse to overwrite a run that is already terminal.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Record a newly accepted run. Fails if the video ID is taken.
    async fn create(&self, run: &PipelineRun) -> StoreResult<()>;

    /// Durably record the current state of a run.
    async fn save(&self, run: &PipelineRun) -> StoreResult<()>;

    async fn load(&self, video_id: &VideoId) -> StoreResult<Option<PipelineRun>>;
}
