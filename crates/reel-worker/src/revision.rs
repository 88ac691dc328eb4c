//! Revision planning.
//!
//! A revision re-derives only what its scene edits touch. The plan is a pure
//! diff between the parent's scenes and the revised scenes:
//!
//! - image prompt changed: new keyframe and new clip
//! - motion prompt changed: new clip from the current keyframe
//! - narration or voice changed: new voiceover
//! - any music direction changed: new music track
//!
//! Changing the aspect ratio invalidates every keyframe and clip.

use std::collections::HashSet;

use thiserror::Error;

use reel_models::{Scene, SceneArtifacts};

use crate::stages::SceneJob;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RevisionError {
    #[error("Revised script has {revised} scenes, parent has {parent}")]
    SceneCount { parent: usize, revised: usize },

    #[error("Revised scene {0} does not exist in the parent")]
    UnknownScene(u32),

    #[error("Revised script repeats scene {0}")]
    DuplicateScene(u32),
}

/// Assets to regenerate for one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneChange {
    pub scene_number: u32,
    pub image: bool,
    pub video: bool,
    pub voiceover: bool,
}

impl SceneChange {
    pub fn is_empty(&self) -> bool {
        !(self.image || self.video || self.voiceover)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionPlan {
    pub changes: Vec<SceneChange>,
    pub regenerate_music: bool,
}

impl RevisionPlan {
    pub fn diff(
        parent: &[Scene],
        revised: &[Scene],
        aspect_changed: bool,
    ) -> Result<Self, RevisionError> {
        if parent.len() != revised.len() {
            return Err(RevisionError::SceneCount { parent: parent.len(), revised: revised.len() });
        }

        let mut seen = HashSet::new();
        let mut changes = Vec::with_capacity(revised.len());
        let mut regenerate_music = false;

        for scene in revised {
            if !seen.insert(scene.scene_number) {
                return Err(RevisionError::DuplicateScene(scene.scene_number));
            }
            let before = parent
                .iter()
                .find(|p| p.scene_number == scene.scene_number)
                .ok_or(RevisionError::UnknownScene(scene.scene_number))?;

            let image = aspect_changed || before.image_prompt != scene.image_prompt;
            changes.push(SceneChange {
                scene_number: scene.scene_number,
                image,
                video: image || before.motion_prompt() != scene.motion_prompt(),
                voiceover: before.voiceover != scene.voiceover || before.voice_id != scene.voice_id,
            });
            regenerate_music |= before.music_direction.trim() != scene.music_direction.trim();
        }

        Ok(Self { changes, regenerate_music })
    }

    pub fn change_for(&self, scene_number: u32) -> Option<&SceneChange> {
        self.changes.iter().find(|c| c.scene_number == scene_number)
    }

    pub fn has_asset_changes(&self) -> bool {
        self.changes.iter().any(|c| !c.is_empty())
    }

    /// Asset jobs for the revised scenes on top of the parent's artifacts.
    ///
    /// Assets the parent never produced are regenerated as well.
    pub fn scene_jobs(&self, scenes: &[Scene], parent_artifacts: &[SceneArtifacts]) -> Vec<SceneJob> {
        scenes
            .iter()
            .map(|scene| {
                let base = parent_artifacts
                    .iter()
                    .find(|a| a.scene_number == scene.scene_number)
                    .cloned()
                    .unwrap_or_else(|| SceneArtifacts::new(scene.scene_number));
                let change = self.change_for(scene.scene_number).copied().unwrap_or_default();
                SceneJob {
                    image: change.image || base.image_url.is_none(),
                    video: change.video || base.video_url.is_none(),
                    voiceover: change.voiceover || base.voiceover_url.is_none(),
                    scene: scene.clone(),
                    base,
                }
            })
            .collect()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let count = |f: fn(&SceneChange) -> bool| self.changes.iter().filter(|&c| f(c)).count();
        format!(
            "regenerate {} images, {} clips, {} voiceovers; music {}",
            count(|c| c.image),
            count(|c| c.video),
            count(|c| c.voiceover),
            if self.regenerate_music { "regenerated" } else { "reused" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> Vec<Scene> {
        vec![
            Scene::new(1, "bottle on sand", "Meet the bottle.").with_music_direction("calm"),
            Scene::new(2, "bottle in fridge", "Always cold.").with_video_prompt("door swings open"),
        ]
    }

    fn artifacts(n: u32) -> SceneArtifacts {
        SceneArtifacts {
            image_url: Some(format!("https://cdn.example.com/img{n}.png")),
            video_url: Some(format!("https://cdn.example.com/clip{n}.mp4")),
            voiceover_url: Some(format!("https://cdn.example.com/vo{n}.mp3")),
            ..SceneArtifacts::new(n)
        }
    }

    #[test]
    fn test_unchanged_scenes_plan_nothing() {
        let plan = RevisionPlan::diff(&parent(), &parent(), false).unwrap();
        assert!(!plan.has_asset_changes());
        assert!(!plan.regenerate_music);

        let jobs = plan.scene_jobs(&parent(), &[artifacts(1), artifacts(2)]);
        assert!(jobs.iter().all(SceneJob::is_noop));
    }

    #[test]
    fn test_image_change_cascades_to_video() {
        let mut revised = parent();
        revised[0].image_prompt = "bottle on snow".into();

        let plan = RevisionPlan::diff(&parent(), &revised, false).unwrap();
        let change = plan.change_for(1).unwrap();
        assert!(change.image && change.video && !change.voiceover);
        assert!(plan.change_for(2).unwrap().is_empty());
    }

    #[test]
    fn test_motion_and_narration_changes() {
        let mut revised = parent();
        revised[1].video_prompt = "camera pulls back".into();
        revised[1].voiceover = "Ice cold, every time.".into();

        let plan = RevisionPlan::diff(&parent(), &revised, false).unwrap();
        let change = plan.change_for(2).unwrap();
        assert!(!change.image);
        assert!(change.video);
        assert!(change.voiceover);
    }

    #[test]
    fn test_music_direction_change() {
        let mut revised = parent();
        revised[0].music_direction = "energetic synth".into();

        let plan = RevisionPlan::diff(&parent(), &revised, false).unwrap();
        assert!(plan.regenerate_music);
        assert!(!plan.has_asset_changes());
    }

    #[test]
    fn test_aspect_change_regenerates_visuals_only() {
        let plan = RevisionPlan::diff(&parent(), &parent(), true).unwrap();
        assert!(plan.changes.iter().all(|c| c.image && c.video && !c.voiceover));
    }

    #[test]
    fn test_missing_parent_assets_are_filled() {
        let plan = RevisionPlan::diff(&parent(), &parent(), false).unwrap();
        let mut degraded = artifacts(2);
        degraded.voiceover_url = None;

        let jobs = plan.scene_jobs(&parent(), &[artifacts(1), degraded]);
        assert!(jobs[0].is_noop());
        assert!(jobs[1].voiceover && !jobs[1].image && !jobs[1].video);
        assert_eq!(jobs[1].base.video_url.as_deref(), Some("https://cdn.example.com/clip2.mp4"));
    }

    #[test]
    fn test_scene_set_must_match() {
        let revised = vec![parent()[0].clone()];
        assert_eq!(
            RevisionPlan::diff(&parent(), &revised, false),
            Err(RevisionError::SceneCount { parent: 2, revised: 1 })
        );

        let mut renumbered = parent();
        renumbered[1].scene_number = 7;
        assert_eq!(
            RevisionPlan::diff(&parent(), &renumbered, false),
            Err(RevisionError::UnknownScene(7))
        );

        let mut repeated = parent();
        repeated[1].scene_number = 1;
        assert_eq!(
            RevisionPlan::diff(&parent(), &repeated, false),
            Err(RevisionError::DuplicateScene(1))
        );
    }
}
