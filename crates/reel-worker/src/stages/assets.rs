//! Per-scene asset generation stage.
//!
//! For each scene the keyframe image and its animation run in sequence while
//! the voiceover runs alongside them. Scenes are processed concurrently up to
//! `max_scene_parallel` and come back in input order.

use futures::stream::{self, StreamExt};
use tracing::warn;

use reel_models::{AspectRatio, Scene, SceneArtifacts};
use reel_remote::{ImageParams, VideoParams, VoiceoverParams};

use super::StageContext;

/// Assets to produce for one scene, on top of the artifacts it already has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneJob {
    pub scene: Scene,
    /// Artifacts kept when an asset is not regenerated or its regeneration fails
    pub base: SceneArtifacts,
    pub image: bool,
    pub video: bool,
    pub voiceover: bool,
}

impl SceneJob {
    /// Every asset from scratch.
    pub fn fresh(scene: Scene) -> Self {
        let base = SceneArtifacts::new(scene.scene_number);
        Self { scene, base, image: true, video: true, voiceover: true }
    }

    /// Nothing to regenerate.
    pub fn is_noop(&self) -> bool {
        !(self.image || self.video || self.voiceover)
    }
}

/// Resolve every job. A failed asset marks its scene degraded; it never
/// fails the stage on its own.
pub async fn generate_assets(
    ctx: &StageContext<'_>,
    jobs: Vec<SceneJob>,
    aspect_ratio: AspectRatio,
    reference_image_url: Option<&str>,
) -> Vec<SceneArtifacts> {
    let parallel = ctx.config.max_scene_parallel.max(1);
    stream::iter(jobs)
        .map(|job| resolve_scene(ctx, job, aspect_ratio, reference_image_url))
        .buffered(parallel)
        .collect()
        .await
}

async fn resolve_scene(
    ctx: &StageContext<'_>,
    job: SceneJob,
    aspect_ratio: AspectRatio,
    reference_image_url: Option<&str>,
) -> SceneArtifacts {
    if job.is_noop() {
        return job.base.carried_over();
    }

    let visual = visual_assets(ctx, &job, aspect_ratio, reference_image_url);
    let narration = narration(ctx, &job);
    let ((image_url, video_url, visual_errors), (voiceover_url, voice_error)) =
        tokio::join!(visual, narration);

    let mut artifacts = SceneArtifacts {
        image_url,
        video_url,
        voiceover_url,
        ..SceneArtifacts::new(job.scene.scene_number)
    };
    for error in visual_errors.into_iter().chain(voice_error) {
        warn!(scene = job.scene.scene_number, error = %error, "Scene asset failed");
        artifacts.note_failure(error);
    }
    artifacts
}

/// Keyframe then clip. A new keyframe always forces a new clip.
async fn visual_assets(
    ctx: &StageContext<'_>,
    job: &SceneJob,
    aspect_ratio: AspectRatio,
    reference_image_url: Option<&str>,
) -> (Option<String>, Option<String>, Vec<String>) {
    let timeouts = &ctx.config.timeouts;
    let mut errors = Vec::new();
    let mut image_url = job.base.image_url.clone();
    let mut video_url = job.base.video_url.clone();
    let mut animate = job.video;

    if job.image {
        let params = ImageParams::new(&job.scene.image_prompt, aspect_ratio).with_reference(reference_image_url);
        match ctx.run_task(params, timeouts.image).await {
            Ok(url) => {
                image_url = Some(url);
                animate = true;
            }
            Err(e) => {
                errors.push(format!("image: {e}"));
                animate = false;
            }
        }
    }

    if animate {
        match image_url.as_deref() {
            Some(image) => {
                let params = VideoParams::new(image, job.scene.motion_prompt());
                match ctx.run_task(params, timeouts.video).await {
                    Ok(url) => video_url = Some(url),
                    Err(e) => errors.push(format!("video: {e}")),
                }
            }
            None => errors.push("video: no keyframe to animate".to_string()),
        }
    } else if job.video && video_url.is_none() {
        errors.push("video: no keyframe to animate".to_string());
    }

    (image_url, video_url, errors)
}

async fn narration(ctx: &StageContext<'_>, job: &SceneJob) -> (Option<String>, Option<String>) {
    if !job.voiceover {
        return (job.base.voiceover_url.clone(), None);
    }
    let voice_id = job
        .scene
        .voice_id
        .clone()
        .or_else(|| ctx.config.default_voice_id.clone());
    let params = VoiceoverParams::new(&job.scene.voiceover, voice_id);
    match ctx.run_task(params, ctx.config.timeouts.voiceover).await {
        Ok(url) => (Some(url), None),
        Err(e) => (job.base.voiceover_url.clone(), Some(format!("voiceover: {e}"))),
    }
}
