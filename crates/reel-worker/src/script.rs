//! Scene scripting.
//!
//! The scene writer turns a prompt into an ordered scene set, or rewrites an
//! existing scene set according to a revision request. [`OpenAiSceneWriter`]
//! talks to any OpenAI-compatible chat completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, Instrument};

use reel_models::{AspectRatio, FailureKind, Scene, StageFailure, VideoModel};

/// What the writer needs to script a fresh video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneBrief {
    pub prompt: String,
    pub model: VideoModel,
    pub aspect_ratio: AspectRatio,
    /// A product or style reference image will be attached to every image task
    pub has_reference_image: bool,
}

/// Scene writer failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Scene writer configuration error: {0}")]
    Config(String),

    #[error("Scene writer request failed: {0}")]
    Request(String),

    #[error("Scene writer returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse scenes: {0}")]
    Parse(String),

    #[error("Expected {expected} scenes, got {actual}")]
    SceneCount { expected: usize, actual: usize },

    #[error("Scene writer timed out after {0:?}")]
    Timeout(Duration),
}

impl ScriptError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ScriptError::Config(_) => FailureKind::Validation,
            ScriptError::Api { status, .. } if (400..500).contains(status) => FailureKind::Rejected,
            ScriptError::Request(_) | ScriptError::Api { .. } => FailureKind::Unavailable,
            ScriptError::Parse(_) | ScriptError::SceneCount { .. } => FailureKind::RemoteFailure,
            ScriptError::Timeout(_) => FailureKind::TimedOut,
        }
    }

    pub fn to_failure(&self) -> StageFailure {
        StageFailure::new(self.failure_kind(), self.to_string())
    }
}

/// Produces and rewrites scene scripts.
#[async_trait]
pub trait SceneWriter: Send + Sync {
    /// Script a fresh scene set for `brief`.
    async fn write_scenes(&self, brief: &SceneBrief) -> Result<Vec<Scene>, ScriptError>;

    /// Rewrite `scenes` according to a free-text revision request.
    async fn revise_scenes(&self, scenes: &[Scene], request: &str) -> Result<Vec<Scene>, ScriptError>;
}

// =============================================================================
// OpenAI-compatible writer
// =============================================================================

/// Chat completions endpoint configuration.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl ScriptConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            request_timeout: Duration::from_secs(90),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ScriptError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ScriptError::Config("OPENAI_API_KEY not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            config = config.with_api_base(base);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        config.request_timeout = Duration::from_secs(
            std::env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(90),
        );
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Scene writer backed by a chat completions API.
pub struct OpenAiSceneWriter {
    config: ScriptConfig,
    client: Client,
}

impl OpenAiSceneWriter {
    pub fn new(config: ScriptConfig) -> Result<Self, ScriptError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("reel-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScriptError::Config(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, ScriptError> {
        let url = format!("{}/chat/completions", self.config.api_base);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system.to_string() },
                ChatMessage { role: "user", content: user },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let span = tracing::info_span!("scene_writer", model = %self.config.model);
        async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| ScriptError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ScriptError::Api { status: status.as_u16(), body });
            }

            let chat: ChatResponse = response
                .json()
                .await
                .map_err(|e| ScriptError::Parse(format!("invalid completion body: {e}")))?;

            let content = chat
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| ScriptError::Parse("no content in completion".into()))?;
            debug!(chars = content.len(), "Received scene script");
            Ok(content)
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl SceneWriter for OpenAiSceneWriter {
    async fn write_scenes(&self, brief: &SceneBrief) -> Result<Vec<Scene>, ScriptError> {
        let expected = brief.model.scene_count();
        let content = self.complete(&write_system_prompt(expected), write_user_prompt(brief)).await?;
        let scenes = parse_scenes(&content)?;
        if scenes.len() != expected {
            return Err(ScriptError::SceneCount { expected, actual: scenes.len() });
        }
        info!(scenes = scenes.len(), "Scripted scenes");
        Ok(scenes)
    }

    async fn revise_scenes(&self, scenes: &[Scene], request: &str) -> Result<Vec<Scene>, ScriptError> {
        let current = serde_json::to_string_pretty(&serde_json::json!({ "scenes": scenes }))
            .map_err(|e| ScriptError::Parse(e.to_string()))?;
        let content = self
            .complete(REVISE_SYSTEM_PROMPT, revise_user_prompt(&current, request))
            .await?;
        let revised = parse_scenes(&content)?;
        if revised.len() != scenes.len() {
            return Err(ScriptError::SceneCount { expected: scenes.len(), actual: revised.len() });
        }
        info!(scenes = revised.len(), "Revised scenes");
        Ok(revised)
    }
}

fn write_system_prompt(count: usize) -> String {
    format!(
        r#"You write scripts for short vertical product videos.
Break the user's idea into exactly {count} scenes that tell one story from hook to call to action.

Return ONLY a JSON object with this schema:
{{
  "scenes": [
    {{
      "scene_number": 1,
      "visual_description": "What the viewer sees",
      "image_prompt": "Detailed prompt for the still keyframe",
      "video_prompt": "Camera and subject motion for animating the keyframe",
      "voiceover": "Narration for this scene, one or two short sentences",
      "music_direction": "Mood and tempo of the background music",
      "sound_effects": "Ambient or foley cues"
    }}
  ]
}}"#
    )
}

fn write_user_prompt(brief: &SceneBrief) -> String {
    let mut prompt = format!(
        "Video idea: {}\nAspect ratio: {}",
        brief.prompt.trim(),
        brief.aspect_ratio
    );
    if brief.has_reference_image {
        prompt.push_str("\nA product reference image is supplied; keep the product visible and consistent in every scene.");
    }
    prompt
}

const REVISE_SYSTEM_PROMPT: &str = r#"You edit existing scene scripts for short videos.
Apply the user's revision request and nothing else.

Rules:
- Return the same number of scenes with the same scene_number values.
- Copy every field the request does not mention exactly as given.
- A change to what the viewer sees goes in visual_description and image_prompt.
- A change to movement or camera work goes in video_prompt.
- A change to narration goes in voiceover.
- A change to the music goes in music_direction.

Return ONLY a JSON object of the form {"scenes": [...]} using the input field names."#;

fn revise_user_prompt(current: &str, request: &str) -> String {
    format!("Current scenes:\n{current}\n\nRevision request: {}", request.trim())
}

/// Strip a Markdown code fence around a JSON payload, if any.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[derive(Debug, Deserialize)]
struct ScriptedScene {
    #[serde(default)]
    scene_number: Option<u32>,
    #[serde(default)]
    visual_description: String,
    #[serde(default)]
    image_prompt: String,
    #[serde(default)]
    video_prompt: String,
    #[serde(default)]
    voiceover: String,
    #[serde(default)]
    music_direction: String,
    #[serde(default)]
    sound_effects: String,
    #[serde(default)]
    voice_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptPayload {
    Wrapped { scenes: Vec<ScriptedScene> },
    Bare(Vec<ScriptedScene>),
}

/// Parse writer output: `{"scenes": [...]}` or a bare array, optionally fenced.
///
/// Missing scene numbers default to the 1-based position. A scene with no
/// image prompt uses its visual description instead.
pub fn parse_scenes(text: &str) -> Result<Vec<Scene>, ScriptError> {
    let payload: ScriptPayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ScriptError::Parse(e.to_string()))?;
    let raw = match payload {
        ScriptPayload::Wrapped { scenes } | ScriptPayload::Bare(scenes) => scenes,
    };
    if raw.is_empty() {
        return Err(ScriptError::Parse("no scenes in response".into()));
    }

    raw.into_iter()
        .enumerate()
        .map(|(i, s)| {
            let scene_number = s.scene_number.unwrap_or(i as u32 + 1);
            let image_prompt = if s.image_prompt.trim().is_empty() {
                s.visual_description.clone()
            } else {
                s.image_prompt
            };
            if image_prompt.trim().is_empty() {
                return Err(ScriptError::Parse(format!("scene {scene_number} has no visual prompt")));
            }
            if s.voiceover.trim().is_empty() {
                return Err(ScriptError::Parse(format!("scene {scene_number} has no voiceover")));
            }
            Ok(Scene {
                scene_number,
                visual_description: s.visual_description,
                image_prompt,
                video_prompt: s.video_prompt,
                voiceover: s.voiceover,
                music_direction: s.music_direction,
                sound_effects: s.sound_effects,
                voice_id: s.voice_id,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_and_fenced() {
        let text = r#"```json
{"scenes": [
  {"scene_number": 1, "visual_description": "Lemon splash", "voiceover": "Fresh.", "music_direction": "bright"},
  {"scene_number": 2, "image_prompt": "Glass on ice", "video_prompt": "slow push in", "voiceover": "Cold."}
]}
```"#;
        let scenes = parse_scenes(text).unwrap();
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].image_prompt, "Lemon splash");
        assert_eq!(scenes[0].music_direction, "bright");
        assert_eq!(scenes[1].motion_prompt(), "slow push in");
    }

    #[test]
    fn test_parse_bare_array_numbers_by_position() {
        let text = r#"[{"image_prompt": "a", "voiceover": "one"}, {"image_prompt": "b", "voiceover": "two"}]"#;
        let scenes = parse_scenes(text).unwrap();
        assert_eq!(scenes[0].scene_number, 1);
        assert_eq!(scenes[1].scene_number, 2);
    }

    #[test]
    fn test_parse_rejects_unusable_output() {
        assert!(matches!(parse_scenes("not json"), Err(ScriptError::Parse(_))));
        assert!(matches!(parse_scenes(r#"{"scenes": []}"#), Err(ScriptError::Parse(_))));
        assert!(matches!(
            parse_scenes(r#"[{"image_prompt": "a", "voiceover": " "}]"#),
            Err(ScriptError::Parse(_))
        ));
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(ScriptError::Timeout(Duration::from_secs(1)).failure_kind(), FailureKind::TimedOut);
        assert_eq!(
            ScriptError::Api { status: 429, body: String::new() }.failure_kind(),
            FailureKind::Rejected
        );
        assert_eq!(
            ScriptError::Api { status: 502, body: String::new() }.failure_kind(),
            FailureKind::Unavailable
        );
    }
}
