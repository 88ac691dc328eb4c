//! Stage identifiers, results and reports.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage identifier, used in failure outcomes and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SceneGeneration,
    AssetGeneration,
    Composition,
    Music,
    Captioning,
    /// Loading and diffing the parent run of a revision
    Revision,
    /// Recording run state
    Persistence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SceneGeneration => "scene_generation",
            Stage::AssetGeneration => "asset_generation",
            Stage::Composition => "composition",
            Stage::Music => "music",
            Stage::Captioning => "captioning",
            Stage::Revision => "revision",
            Stage::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage could not produce an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input rejected locally before any network call
    Validation,
    /// Remote system refused the submission
    Rejected,
    /// Remote system reported a terminal failure
    RemoteFailure,
    /// No terminal status within the stage deadline
    TimedOut,
    /// Collaborator unreachable (scene writer, transport)
    Unavailable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Rejected => "rejected",
            FailureKind::RemoteFailure => "remote_failure",
            FailureKind::TimedOut => "timed_out",
            FailureKind::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// Output of a stage function.
///
/// Either an artifact URL was produced (possibly a degraded fallback) or the
/// stage failed; never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageResult {
    Produced { url: String },
    /// A usable but lower-fidelity artifact (for example the uncaptioned video)
    Degraded { url: String, reason: String },
    Failed(StageFailure),
}

impl StageResult {
    pub fn produced(url: impl Into<String>) -> Self {
        Self::Produced { url: url.into() }
    }

    pub fn degraded(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Degraded { url: url.into(), reason: reason.into() }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed(StageFailure::new(kind, message))
    }

    pub fn produced_url(&self) -> Option<&str> {
        match self {
            StageResult::Produced { url } | StageResult::Degraded { url, .. } => Some(url),
            StageResult::Failed(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageResult::Degraded { .. })
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            StageResult::Failed(f) => Some(f),
            _ => None,
        }
    }

    /// Split into the artifact URL or the failure.
    pub fn into_url(self) -> Result<String, StageFailure> {
        match self {
            StageResult::Produced { url } | StageResult::Degraded { url, .. } => Ok(url),
            StageResult::Failed(f) => Err(f),
        }
    }
}

/// How a stage ended within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Degraded,
    /// Stage intentionally absent from the output (no music)
    Skipped,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Completed => "completed",
            StageStatus::Degraded => "degraded",
            StageStatus::Skipped => "skipped",
            StageStatus::Failed => "failed",
        }
    }
}

/// Per-stage record kept on the run so operators can tell
/// "fully captioned" from "captioning skipped".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl StageReport {
    pub fn new(stage: Stage, status: StageStatus, message: Option<String>) -> Self {
        Self { stage, status, message, finished_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result_accessors() {
        let ok = StageResult::produced("https://cdn/a.mp4");
        assert_eq!(ok.produced_url(), Some("https://cdn/a.mp4"));
        assert!(!ok.is_degraded());
        assert!(ok.failure().is_none());

        let degraded = StageResult::degraded("https://cdn/a.mp4", "caption timed out");
        assert_eq!(degraded.produced_url(), Some("https://cdn/a.mp4"));
        assert!(degraded.is_degraded());

        let failed = StageResult::failed(FailureKind::RemoteFailure, "boom");
        assert!(failed.produced_url().is_none());
        assert_eq!(failed.failure().map(|f| f.kind), Some(FailureKind::RemoteFailure));
    }

    #[test]
    fn test_stage_result_serde_shape() {
        let json = serde_json::to_value(StageResult::degraded("u", "r")).unwrap();
        assert_eq!(json["outcome"], "degraded");
        assert_eq!(json["url"], "u");

        let json = serde_json::to_value(StageResult::failed(FailureKind::TimedOut, "late")).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["kind"], "timed_out");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Composition.as_str(), "composition");
        assert_eq!(
            serde_json::to_string(&Stage::SceneGeneration).unwrap(),
            "\"scene_generation\""
        );
    }
}
