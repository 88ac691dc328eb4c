//! Video identity, output geometry and workflow model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a video (one pipeline run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Output aspect ratio of the final video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Vertical short-form (Reels, Shorts, TikTok)
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    InstagramPortrait,
    #[serde(rename = "3:4")]
    Classic,
    #[serde(rename = "4:3")]
    ClassicLandscape,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::InstagramPortrait => "4:5",
            AspectRatio::Classic => "3:4",
            AspectRatio::ClassicLandscape => "4:3",
        }
    }

    /// Output resolution `(width, height)` in pixels for the composed video.
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            AspectRatio::Portrait => (1080, 1920),
            AspectRatio::Landscape => (1920, 1080),
            AspectRatio::Square => (1080, 1080),
            AspectRatio::InstagramPortrait => (1080, 1350),
            AspectRatio::Classic => (1080, 1440),
            AspectRatio::ClassicLandscape => (1440, 1080),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "9:16" => Ok(AspectRatio::Portrait),
            "16:9" => Ok(AspectRatio::Landscape),
            "1:1" => Ok(AspectRatio::Square),
            "4:5" => Ok(AspectRatio::InstagramPortrait),
            "3:4" => Ok(AspectRatio::Classic),
            "4:3" => Ok(AspectRatio::ClassicLandscape),
            other if other.split(':').count() == 2 => {
                Err(AspectRatioParseError::Unsupported(other.to_string()))
            }
            other => Err(AspectRatioParseError::InvalidFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Unsupported aspect ratio: {0}")]
    Unsupported(String),
}

/// Scene workflow used to script the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoModel {
    /// Five-scene commercial script
    #[default]
    Standard,
    /// Six-scene script with per-scene motion prompts
    SixScene,
}

impl VideoModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoModel::Standard => "standard",
            VideoModel::SixScene => "six_scene",
        }
    }

    /// Number of scenes the scene writer must produce for this model.
    pub fn scene_count(&self) -> usize {
        match self {
            VideoModel::Standard => 5,
            VideoModel::SixScene => 6,
        }
    }

    /// Infer the workflow from an existing scene set (revision of older runs).
    pub fn from_scene_count(count: usize) -> Self {
        if count == 6 {
            VideoModel::SixScene
        } else {
            VideoModel::Standard
        }
    }
}

impl fmt::Display for VideoModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
