//! Remote task models.
//!
//! A [`RemoteTask`] is one unit of work submitted to an external processor
//! (merge, music mix, caption burn-in, image/video/voice/music synthesis).
//! Its status mirrors what the remote system reports; once it reaches
//! `success` or `failed` it never changes again.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the remote system at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of remote work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Concatenate scene clips and mix voiceovers
    Merge,
    /// Mix a music track under a video
    BackgroundMusic,
    /// Transcribe and burn captions into a video
    Caption,
    Image,
    Video,
    Voiceover,
    /// Synthesize a music track from a prompt
    Music,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Merge => "merge",
            TaskKind::BackgroundMusic => "background-music",
            TaskKind::Caption => "caption",
            TaskKind::Image => "image",
            TaskKind::Video => "video",
            TaskKind::Voiceover => "voiceover",
            TaskKind::Music => "music",
        }
    }

    /// Generation kinds synthesize new media; the rest post-process video.
    pub fn is_generation(&self) -> bool {
        matches!(
            self,
            TaskKind::Image | TaskKind::Video | TaskKind::Voiceover | TaskKind::Music
        )
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as reported by the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    #[default]
    Queued,
    Running,
    Success,
    Failed,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Queued => "queued",
            RemoteStatus::Running => "running",
            RemoteStatus::Success => "success",
            RemoteStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more polling).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Success | RemoteStatus::Failed)
    }

    /// Parse a status string from the wire. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => Some(RemoteStatus::Queued),
            "running" | "processing" => Some(RemoteStatus::Running),
            "success" => Some(RemoteStatus::Success),
            "failed" => Some(RemoteStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status reading returned by a status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskSnapshot {
    pub fn queued() -> Self {
        Self { status: RemoteStatus::Queued, url: None, error: None }
    }

    pub fn running() -> Self {
        Self { status: RemoteStatus::Running, url: None, error: None }
    }

    pub fn success(url: impl Into<String>) -> Self {
        Self { status: RemoteStatus::Success, url: Some(url.into()), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: RemoteStatus::Failed, url: None, error: Some(error.into()) }
    }
}

const UNKNOWN_FAILURE: &str = "Task failed with unknown error";
const MISSING_RESULT_URL: &str = "Task completed without a result URL";

/// An in-flight unit of remote work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub submitted_at: DateTime<Utc>,
    pub status: RemoteStatus,
    /// Present only when status is `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Present only when status is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RemoteTask {
    /// A task the remote system has just accepted.
    pub fn submitted(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            submitted_at: Utc::now(),
            status: RemoteStatus::Queued,
            result_url: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status reading. Returns `false` if the task was already terminal
    /// and the snapshot was ignored.
    ///
    /// A `success` without a usable URL is recorded as a failure, so callers
    /// never see a successful task with nothing to consume.
    pub fn observe(&mut self, snapshot: TaskSnapshot) -> bool {
        if self.is_terminal() {
            return false;
        }

        match snapshot.status {
            RemoteStatus::Success => {
                match snapshot.url.as_deref().and_then(normalize_result_url) {
                    Some(url) => {
                        self.status = RemoteStatus::Success;
                        self.result_url = Some(url);
                    }
                    None => {
                        self.status = RemoteStatus::Failed;
                        self.error_message = Some(MISSING_RESULT_URL.to_string());
                    }
                }
            }
            RemoteStatus::Failed => {
                self.status = RemoteStatus::Failed;
                self.error_message = Some(
                    snapshot
                        .error
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
                );
            }
            status => self.status = status,
        }
        true
    }
}

/// Normalize a result URL, prefixing `https://` when the scheme is missing.
/// Blank input yields `None`.
pub fn normalize_result_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{}", trimmed.trim_start_matches('/')))
    }
}
