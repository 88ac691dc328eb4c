//! Music stage: synthesize a track and mix it under the composed video.

use tracing::warn;

use reel_models::Scene;
use reel_remote::{BackgroundMusicParams, MusicParams};

use super::StageContext;

/// Used when no scene carries a music direction.
pub const DEFAULT_MUSIC_PROMPT: &str =
    "Upbeat commercial background music, energetic and engaging, perfect for product showcase";

const INSTRUMENTAL_SUFFIX: &str = " (no words only melody)";

/// How the music stage ended. There is no failed variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicOutcome {
    Applied { music_url: String, video_url: String },
    Skipped { reason: String },
}

/// Instrumental prompt built from the scenes' music directions.
pub fn music_prompt(scenes: &[Scene]) -> String {
    let directions: Vec<&str> = scenes
        .iter()
        .map(|s| s.music_direction.trim())
        .filter(|d| !d.is_empty())
        .collect();
    let base = if directions.is_empty() {
        DEFAULT_MUSIC_PROMPT.to_string()
    } else {
        directions.join(" ")
    };
    format!("{base}{INSTRUMENTAL_SUFFIX}")
}

/// Add music to `composed_url`. `existing_track` skips synthesis and mixes
/// that track instead. Any failure skips the stage.
pub async fn add_music(
    ctx: &StageContext<'_>,
    composed_url: &str,
    scenes: &[Scene],
    existing_track: Option<&str>,
) -> MusicOutcome {
    let timeouts = &ctx.config.timeouts;

    let music_url = match existing_track {
        Some(url) => url.to_string(),
        None => match ctx.run_task(MusicParams::new(music_prompt(scenes)), timeouts.music).await {
            Ok(url) => url,
            Err(e) => return skipped(format!("music generation: {e}")),
        },
    };

    let params = BackgroundMusicParams::new(composed_url, &music_url);
    match ctx.run_task(params, timeouts.music_mix).await {
        Ok(video_url) => MusicOutcome::Applied { music_url, video_url },
        Err(e) => skipped(format!("music mix: {e}")),
    }
}

fn skipped(reason: String) -> MusicOutcome {
    warn!(reason = %reason, "Skipping background music");
    MusicOutcome::Skipped { reason }
}
