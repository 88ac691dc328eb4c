//! Captioning stage.

use tracing::warn;

use reel_models::StageResult;
use reel_remote::CaptionParams;

use super::StageContext;

/// Burn captions into `video_url`.
///
/// Never fails: on any error or timeout the input URL comes back unchanged
/// as a degraded result, so a finished video is never withheld.
pub async fn caption(ctx: &StageContext<'_>, video_url: &str) -> StageResult {
    let params = CaptionParams::new(video_url, ctx.config.caption_model);
    match ctx.run_task(params, ctx.config.timeouts.caption).await {
        Ok(url) => StageResult::produced(url),
        Err(e) => {
            warn!(error = %e, "Captioning failed, keeping uncaptioned video");
            StageResult::degraded(video_url, e.to_string())
        }
    }
}
