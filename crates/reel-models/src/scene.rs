//! Scene scripts and the media produced for each scene.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One scripted scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 1-based position in the video
    pub scene_number: u32,
    /// What the viewer sees
    #[serde(default)]
    pub visual_description: String,
    /// Prompt for the still keyframe
    pub image_prompt: String,
    /// Motion prompt for image-to-video; falls back to `visual_description`
    #[serde(default)]
    pub video_prompt: String,
    /// Narration text
    pub voiceover: String,
    #[serde(default)]
    pub music_direction: String,
    #[serde(default)]
    pub sound_effects: String,
    /// Voice override for the narration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl Scene {
    pub fn new(
        scene_number: u32,
        image_prompt: impl Into<String>,
        voiceover: impl Into<String>,
    ) -> Self {
        Self {
            scene_number,
            visual_description: String::new(),
            image_prompt: image_prompt.into(),
            video_prompt: String::new(),
            voiceover: voiceover.into(),
            music_direction: String::new(),
            sound_effects: String::new(),
            voice_id: None,
        }
    }

    pub fn with_video_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.video_prompt = prompt.into();
        self
    }

    pub fn with_music_direction(mut self, direction: impl Into<String>) -> Self {
        self.music_direction = direction.into();
        self
    }

    /// Prompt used for the image-to-video task.
    pub fn motion_prompt(&self) -> &str {
        [&self.video_prompt, &self.visual_description, &self.image_prompt]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }
}

/// Media produced for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SceneArtifacts {
    pub scene_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_url: Option<String>,
    /// At least one asset for this scene failed
    #[serde(default)]
    pub degraded: bool,
    /// Failure notes for the assets that could not be produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl SceneArtifacts {
    pub fn new(scene_number: u32) -> Self {
        Self { scene_number, ..Default::default() }
    }

    /// A scene can be merged only with both a clip and its narration.
    pub fn is_composable(&self) -> bool {
        self.video_url.is_some() && self.voiceover_url.is_some()
    }

    /// The same assets without failure notes from the run that made them.
    pub fn carried_over(mut self) -> Self {
        self.degraded = false;
        self.errors.clear();
        self
    }

    /// Record an asset failure and mark the scene degraded.
    pub fn note_failure(&mut self, message: impl Into<String>) {
        self.degraded = true;
        self.errors.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_prompt_fallback() {
        let scene = Scene::new(1, "a red bottle on sand", "Meet the bottle.");
        assert_eq!(scene.motion_prompt(), "a red bottle on sand");

        let mut scene = scene;
        scene.visual_description = "slow pan over the beach".into();
        assert_eq!(scene.motion_prompt(), "slow pan over the beach");

        let scene = scene.with_video_prompt("camera orbits the bottle");
        assert_eq!(scene.motion_prompt(), "camera orbits the bottle");
    }

    #[test]
    fn test_scene_deserializes_with_optional_fields_missing() {
        let json = r#"{"scene_number": 2, "image_prompt": "city at dusk", "voiceover": "Night falls."}"#;
        let scene: Scene = serde_json::from_str(json).unwrap();
        assert_eq!(scene.scene_number, 2);
        assert!(scene.music_direction.is_empty());
        assert!(scene.voice_id.is_none());
    }

    #[test]
    fn test_artifacts_composable() {
        let mut a = SceneArtifacts::new(1);
        a.video_url = Some("https://cdn/v.mp4".into());
        assert!(!a.is_composable());
        a.voiceover_url = Some("https://cdn/v.mp3".into());
        assert!(a.is_composable());
        assert!(!a.degraded);

        a.note_failure("image: timed out");
        assert!(a.degraded);
        assert_eq!(a.errors.len(), 1);

        let kept = a.carried_over();
        assert!(!kept.degraded);
        assert!(kept.errors.is_empty());
        assert_eq!(kept.video_url.as_deref(), Some("https://cdn/v.mp4"));
    }
}
