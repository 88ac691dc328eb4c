//! Task parameters, one record per remote task kind.
//!
//! Every record validates itself before submission. A [`TaskParams`] that
//! fails [`TaskParams::validate`] is never sent.

use std::fmt;
use std::str::FromStr;

use reel_models::{AspectRatio, TaskKind};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// =============================================================================
// Limits
// =============================================================================

pub const MIN_DIMENSION: u32 = 480;
pub const MAX_DIMENSION: u32 = 3840;
pub const MIN_VOLUME: f64 = 0.0;
pub const MAX_VOLUME: f64 = 10.0;
pub const MAX_URL_LEN: usize = 2048;
/// Ceiling for prompt and narration payloads.
pub const MAX_TEXT_LEN: usize = 5000;
pub const VIDEO_DURATION_SECS: (u32, u32) = (1, 10);
pub const MUSIC_DURATION_SECS: (u32, u32) = (5, 120);

// =============================================================================
// Caption model
// =============================================================================

/// Speech-recognition model size used for caption transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionModel {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
    Large,
}

impl CaptionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionModel::Tiny => "tiny",
            CaptionModel::Base => "base",
            CaptionModel::Small => "small",
            CaptionModel::Medium => "medium",
            CaptionModel::Large => "large",
        }
    }
}

impl fmt::Display for CaptionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(CaptionModel::Tiny),
            "base" => Ok(CaptionModel::Base),
            "small" => Ok(CaptionModel::Small),
            "medium" => Ok(CaptionModel::Medium),
            "large" => Ok(CaptionModel::Large),
            other => Err(format!("unknown caption model size: {other}")),
        }
    }
}

// =============================================================================
// Parameter records
// =============================================================================

/// Concatenate scene clips, laying each voiceover over its clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeParams {
    pub scene_clip_urls: Vec<String>,
    pub voiceover_urls: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub video_volume: f64,
    pub voiceover_volume: f64,
}

impl MergeParams {
    pub fn new(scene_clip_urls: Vec<String>, voiceover_urls: Vec<String>) -> Self {
        Self {
            scene_clip_urls,
            voiceover_urls,
            width: 1080,
            height: 1920,
            video_volume: 0.2,
            voiceover_volume: 2.0,
        }
    }

    pub fn with_resolution(mut self, (width, height): (u32, u32)) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.scene_clip_urls.is_empty() {
            return Err(ValidationError::empty("scene_clip_urls"));
        }
        if self.scene_clip_urls.len() != self.voiceover_urls.len() {
            return Err(ValidationError::LengthMismatch {
                left: "scene_clip_urls".into(),
                left_len: self.scene_clip_urls.len(),
                right: "voiceover_urls".into(),
                right_len: self.voiceover_urls.len(),
            });
        }
        for (i, url) in self.scene_clip_urls.iter().enumerate() {
            check_url(&format!("scene_clip_urls[{i}]"), url)?;
        }
        for (i, url) in self.voiceover_urls.iter().enumerate() {
            check_url(&format!("voiceover_urls[{i}]"), url)?;
        }
        check_dimension("width", self.width)?;
        check_dimension("height", self.height)?;
        check_volume("video_volume", self.video_volume)?;
        check_volume("voiceover_volume", self.voiceover_volume)
    }
}

/// Mix a music track under an existing video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundMusicParams {
    pub video_url: String,
    pub music_url: String,
    pub music_volume: f64,
    pub video_volume: f64,
}

impl BackgroundMusicParams {
    pub fn new(video_url: impl Into<String>, music_url: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            music_url: music_url.into(),
            music_volume: 0.3,
            video_volume: 1.0,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_url("video_url", &self.video_url)?;
        check_url("music_url", &self.music_url)?;
        check_volume("music_volume", self.music_volume)?;
        check_volume("video_volume", self.video_volume)
    }
}

/// Transcribe and burn captions into a video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionParams {
    pub video_url: String,
    pub model_size: CaptionModel,
}

impl CaptionParams {
    pub fn new(video_url: impl Into<String>, model_size: CaptionModel) -> Self {
        Self { video_url: video_url.into(), model_size }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_url("video_url", &self.video_url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference_image_urls: Vec<String>,
    pub aspect_ratio: AspectRatio,
}

impl ImageParams {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image_urls: Vec::new(),
            aspect_ratio,
        }
    }

    pub fn with_reference(mut self, url: Option<&str>) -> Self {
        self.reference_image_urls.extend(url.map(str::to_string));
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_text("prompt", &self.prompt)?;
        for (i, url) in self.reference_image_urls.iter().enumerate() {
            check_url(&format!("reference_image_urls[{i}]"), url)?;
        }
        Ok(())
    }
}

/// Animate a still image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoParams {
    pub image_url: String,
    pub prompt: String,
    pub duration_secs: u32,
}

impl VideoParams {
    pub fn new(image_url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            prompt: prompt.into(),
            duration_secs: 5,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_url("image_url", &self.image_url)?;
        check_text("prompt", &self.prompt)?;
        check_range(
            "duration_secs",
            self.duration_secs as f64,
            VIDEO_DURATION_SECS.0 as f64,
            VIDEO_DURATION_SECS.1 as f64,
        )
    }
}

/// Text-to-speech narration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceoverParams {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl VoiceoverParams {
    pub fn new(text: impl Into<String>, voice_id: Option<String>) -> Self {
        Self { text: text.into(), voice_id }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_text("text", &self.text)
    }
}

/// Instrumental music synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MusicParams {
    pub prompt: String,
    pub duration_secs: u32,
}

impl MusicParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), duration_secs: 30 }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_text("prompt", &self.prompt)?;
        check_range(
            "duration_secs",
            self.duration_secs as f64,
            MUSIC_DURATION_SECS.0 as f64,
            MUSIC_DURATION_SECS.1 as f64,
        )
    }
}

// =============================================================================
// Tagged union
// =============================================================================

/// Parameters for one remote task, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskParams {
    Merge(MergeParams),
    BackgroundMusic(BackgroundMusicParams),
    Caption(CaptionParams),
    Image(ImageParams),
    Video(VideoParams),
    Voiceover(VoiceoverParams),
    Music(MusicParams),
}

impl TaskParams {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskParams::Merge(_) => TaskKind::Merge,
            TaskParams::BackgroundMusic(_) => TaskKind::BackgroundMusic,
            TaskParams::Caption(_) => TaskKind::Caption,
            TaskParams::Image(_) => TaskKind::Image,
            TaskParams::Video(_) => TaskKind::Video,
            TaskParams::Voiceover(_) => TaskKind::Voiceover,
            TaskParams::Music(_) => TaskKind::Music,
        }
    }

    /// Check every field against the limits for this kind.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TaskParams::Merge(p) => p.validate(),
            TaskParams::BackgroundMusic(p) => p.validate(),
            TaskParams::Caption(p) => p.validate(),
            TaskParams::Image(p) => p.validate(),
            TaskParams::Video(p) => p.validate(),
            TaskParams::Voiceover(p) => p.validate(),
            TaskParams::Music(p) => p.validate(),
        }
    }

    /// JSON request body.
    pub fn body(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            TaskParams::Merge(p) => serde_json::to_value(p),
            TaskParams::BackgroundMusic(p) => serde_json::to_value(p),
            TaskParams::Caption(p) => serde_json::to_value(p),
            TaskParams::Image(p) => serde_json::to_value(p),
            TaskParams::Video(p) => serde_json::to_value(p),
            TaskParams::Voiceover(p) => serde_json::to_value(p),
            TaskParams::Music(p) => serde_json::to_value(p),
        }
    }
}

impl From<MergeParams> for TaskParams {
    fn from(p: MergeParams) -> Self {
        TaskParams::Merge(p)
    }
}

impl From<BackgroundMusicParams> for TaskParams {
    fn from(p: BackgroundMusicParams) -> Self {
        TaskParams::BackgroundMusic(p)
    }
}

impl From<CaptionParams> for TaskParams {
    fn from(p: CaptionParams) -> Self {
        TaskParams::Caption(p)
    }
}

impl From<ImageParams> for TaskParams {
    fn from(p: ImageParams) -> Self {
        TaskParams::Image(p)
    }
}

impl From<VideoParams> for TaskParams {
    fn from(p: VideoParams) -> Self {
        TaskParams::Video(p)
    }
}

impl From<VoiceoverParams> for TaskParams {
    fn from(p: VoiceoverParams) -> Self {
        TaskParams::Voiceover(p)
    }
}

impl From<MusicParams> for TaskParams {
    fn from(p: MusicParams) -> Self {
        TaskParams::Music(p)
    }
}

// =============================================================================
// Field checks
// =============================================================================

fn check_url(field: &str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty(field));
    }
    if trimmed.len() > MAX_URL_LEN {
        return Err(ValidationError::TooLong { field: field.to_string(), max: MAX_URL_LEN });
    }
    // The field is sent as written, and the url parser would forgive padding.
    let valid = trimmed.len() == value.len()
        && url::Url::parse(value)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
            .unwrap_or(false);
    if !valid {
        return Err(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty(field));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong { field: field.to_string(), max: MAX_TEXT_LEN });
    }
    Ok(())
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::OutOfRange { field: field.to_string(), value, min, max });
    }
    Ok(())
}

fn check_dimension(field: &str, value: u32) -> Result<(), ValidationError> {
    check_range(field, value as f64, MIN_DIMENSION as f64, MAX_DIMENSION as f64)
}

fn check_volume(field: &str, value: f64) -> Result<(), ValidationError> {
    check_range(field, value, MIN_VOLUME, MAX_VOLUME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://cdn.example.com/{prefix}{i}")).collect()
    }

    #[test]
    fn test_merge_defaults_are_valid() {
        let p = TaskParams::from(MergeParams::new(urls("clip", 3), urls("vo", 3)));
        assert_eq!(p.kind(), TaskKind::Merge);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_merge_length_mismatch() {
        let p = MergeParams::new(urls("clip", 3), urls("vo", 2));
        let err = TaskParams::from(p).validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::LengthMismatch { left_len: 3, right_len: 2, .. }
        ));
    }

    #[test]
    fn test_merge_requires_clips() {
        let p = MergeParams::new(Vec::new(), Vec::new());
        assert!(matches!(p.validate(), Err(ValidationError::Empty { .. })));
    }

    #[test]
    fn test_dimension_bounds() {
        let ok = MergeParams::new(urls("c", 1), urls("v", 1)).with_resolution((480, 3840));
        assert!(ok.validate().is_ok());

        let too_small = MergeParams::new(urls("c", 1), urls("v", 1)).with_resolution((479, 1920));
        assert!(matches!(
            too_small.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "width"
        ));

        let too_big = MergeParams::new(urls("c", 1), urls("v", 1)).with_resolution((1080, 3841));
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_volume_bounds() {
        let mut p = BackgroundMusicParams::new("https://a.io/v.mp4", "https://a.io/m.mp3");
        p.music_volume = 10.0;
        assert!(p.validate().is_ok());
        p.music_volume = 10.5;
        assert!(p.validate().is_err());
        p.music_volume = f64::NAN;
        assert!(p.validate().is_err());
        p.music_volume = -0.1;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_url_must_have_scheme() {
        let p = CaptionParams::new("cdn.example.com/video.mp4", CaptionModel::Small);
        assert!(matches!(p.validate(), Err(ValidationError::InvalidUrl { .. })));

        let p = CaptionParams::new("ftp://cdn.example.com/video.mp4", CaptionModel::Small);
        assert!(p.validate().is_err());

        let p = CaptionParams::new("   ", CaptionModel::Small);
        assert!(matches!(p.validate(), Err(ValidationError::Empty { .. })));
    }

    #[test]
    fn test_padded_url_is_rejected() {
        let p = BackgroundMusicParams::new(
            " https://cdn.example.com/merged.mp4",
            "https://cdn.example.com/track.mp3",
        );
        assert!(matches!(
            p.validate(),
            Err(ValidationError::InvalidUrl { ref field, .. }) if field == "video_url"
        ));

        let p = CaptionParams::new("https://cdn.example.com/video.mp4\n", CaptionModel::Small);
        assert!(matches!(p.validate(), Err(ValidationError::InvalidUrl { .. })));

        let p = CaptionParams::new("https://cdn.example.com/video.mp4", CaptionModel::Small);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_text_ceiling() {
        let p = VoiceoverParams::new("a".repeat(MAX_TEXT_LEN + 1), None);
        assert!(matches!(p.validate(), Err(ValidationError::TooLong { .. })));
        let p = VoiceoverParams::new("Short and sweet.", Some("voice-1".into()));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_video_duration_range() {
        let mut p = VideoParams::new("https://a.io/frame.png", "slow zoom");
        assert!(p.validate().is_ok());
        p.duration_secs = 11;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_body_has_no_tag() {
        let body = TaskParams::from(CaptionParams::new("https://a.io/v.mp4", CaptionModel::Medium))
            .body()
            .unwrap();
        assert_eq!(body["video_url"], "https://a.io/v.mp4");
        assert_eq!(body["model_size"], "medium");
        assert!(body.get("kind").is_none());
    }

    #[test]
    fn test_caption_model_parse() {
        assert_eq!("LARGE".parse::<CaptionModel>(), Ok(CaptionModel::Large));
        assert!("huge".parse::<CaptionModel>().is_err());
        assert_eq!(CaptionModel::default(), CaptionModel::Small);
    }
}
