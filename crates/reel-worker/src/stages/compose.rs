//! Composition stage: merge scene clips and voiceovers into one video.

use tracing::info;

use reel_models::{AspectRatio, FailureKind, SceneArtifacts, StageResult};
use reel_remote::MergeParams;

use super::StageContext;

/// Merge every composable scene, in scene order. There is no fallback
/// artifact, so any failure is returned as [`StageResult::Failed`].
pub async fn compose(
    ctx: &StageContext<'_>,
    artifacts: &[SceneArtifacts],
    aspect_ratio: AspectRatio,
) -> StageResult {
    let (clips, voiceovers): (Vec<String>, Vec<String>) = artifacts
        .iter()
        .filter_map(|a| Some((a.video_url.clone()?, a.voiceover_url.clone()?)))
        .unzip();

    if clips.is_empty() {
        return StageResult::failed(FailureKind::Validation, "no composable scenes to merge");
    }

    let scenes = clips.len();
    let params = MergeParams::new(clips, voiceovers).with_resolution(aspect_ratio.resolution());
    match ctx.run_task(params, ctx.config.timeouts.merge).await {
        Ok(url) => {
            info!(scenes, "Merged scene clips");
            StageResult::produced(url)
        }
        Err(e) => StageResult::Failed(e.to_failure()),
    }
}
