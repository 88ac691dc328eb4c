//! Requests accepted by the pipeline entry points.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::{AspectRatio, VideoId, VideoModel};

/// Generate a new video from a text prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerateVideoRequest {
    pub video_id: VideoId,
    pub user_id: String,
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub model: VideoModel,
    /// Product or style reference for image generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,
}

impl GenerateVideoRequest {
    pub fn new(user_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            video_id: VideoId::new(),
            user_id: user_id.into(),
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            model: VideoModel::default(),
            reference_image_url: None,
        }
    }

    pub fn with_video_id(mut self, video_id: VideoId) -> Self {
        self.video_id = video_id;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect: AspectRatio) -> Self {
        self.aspect_ratio = aspect;
        self
    }

    pub fn with_model(mut self, model: VideoModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_reference_image(mut self, url: impl Into<String>) -> Self {
        self.reference_image_url = Some(url.into());
        self
    }
}

/// Revise a completed video. The parent run is read, never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReviseVideoRequest {
    pub video_id: VideoId,
    pub parent_video_id: VideoId,
    pub user_id: String,
    /// Free-text change request, e.g. "make the voiceover more upbeat"
    pub revision_request: String,
    /// Defaults to the parent's aspect ratio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,
}

impl ReviseVideoRequest {
    pub fn new(
        parent_video_id: VideoId,
        user_id: impl Into<String>,
        revision_request: impl Into<String>,
    ) -> Self {
        Self {
            video_id: VideoId::new(),
            parent_video_id,
            user_id: user_id.into(),
            revision_request: revision_request.into(),
            aspect_ratio: None,
            reference_image_url: None,
        }
    }

    pub fn with_video_id(mut self, video_id: VideoId) -> Self {
        self.video_id = video_id;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect);
        self
    }

    pub fn with_reference_image(mut self, url: impl Into<String>) -> Self {
        self.reference_image_url = Some(url.into());
        self
    }
}
