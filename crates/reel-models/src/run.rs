//! Pipeline run state.
//!
//! A [`PipelineRun`] is the record of one video request. The orchestrator
//! mutates it in place as each stage resolves; every mutation goes through a
//! `record_*` method that enforces forward-only state transitions and refuses
//! to touch a run whose final status has left `processing`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::scene::{Scene, SceneArtifacts};
use crate::stage::{Stage, StageReport, StageStatus};
use crate::video::{AspectRatio, VideoId, VideoModel};

/// Position of a run in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Received,
    ScenesReady,
    AssetsReady,
    Composed,
    MusicApplied,
    MusicSkipped,
    Captioned,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::ScenesReady => "scenes_ready",
            PipelineState::AssetsReady => "assets_ready",
            PipelineState::Composed => "composed",
            PipelineState::MusicApplied => "music_applied",
            PipelineState::MusicSkipped => "music_skipped",
            PipelineState::Captioned => "captioned",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }

    /// Ordinal along the happy path; `None` for `failed`.
    fn rank(&self) -> Option<u8> {
        match self {
            PipelineState::Received => Some(0),
            PipelineState::ScenesReady => Some(1),
            PipelineState::AssetsReady => Some(2),
            PipelineState::Composed => Some(3),
            PipelineState::MusicApplied | PipelineState::MusicSkipped => Some(4),
            PipelineState::Captioned => Some(5),
            PipelineState::Completed => Some(6),
            PipelineState::Failed => None,
        }
    }

    /// Forward moves only. `failed` is reachable from any non-terminal state.
    /// Skipping ahead is allowed so a revision can resume at `composed`.
    pub fn can_advance_to(&self, next: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    /// Progress percentage reported while the run sits in this state.
    pub fn progress(&self) -> u8 {
        match self {
            PipelineState::Received => 5,
            PipelineState::ScenesReady => 20,
            PipelineState::AssetsReady => 55,
            PipelineState::Composed => 75,
            PipelineState::MusicApplied | PipelineState::MusicSkipped => 85,
            PipelineState::Captioned => 95,
            PipelineState::Completed => 100,
            PipelineState::Failed => 0,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of a run as seen by the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Processing)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected run mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("Run {0} is {1} and can no longer change")]
    Terminal(VideoId, RunStatus),

    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition { from: PipelineState, to: PipelineState },

    #[error("Missing input: {0}")]
    MissingInput(String),
}

/// Single structured outcome handed back to the caller of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        video_id: VideoId,
        final_url: String,
        /// Stages that fell back to a lower-fidelity artifact
        #[serde(default)]
        degraded_stages: Vec<Stage>,
        /// Stages intentionally absent from the output
        #[serde(default)]
        skipped_stages: Vec<Stage>,
    },
    Failed {
        video_id: VideoId,
        stage: Stage,
        message: String,
    },
}

impl RunOutcome {
    pub fn video_id(&self) -> &VideoId {
        match self {
            RunOutcome::Completed { video_id, .. } | RunOutcome::Failed { video_id, .. } => video_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn final_url(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { final_url, .. } => Some(final_url),
            RunOutcome::Failed { .. } => None,
        }
    }
}

/// End-to-end state for one video request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineRun {
    pub video_id: VideoId,
    pub user_id: String,
    /// User prompt (fresh runs) or revision request (revisions)
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub model: VideoModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,
    /// Run whose artifacts this revision reuses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_video_id: Option<VideoId>,

    #[serde(default)]
    pub state: PipelineState,
    #[serde(default)]
    pub final_status: RunStatus,
    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress: u8,

    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub artifacts: Vec<SceneArtifacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captioned_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    #[serde(default)]
    pub stages: Vec<StageReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create a run in the `received` state.
    pub fn new(
        video_id: VideoId,
        user_id: impl Into<String>,
        prompt: impl Into<String>,
        aspect_ratio: AspectRatio,
        model: VideoModel,
    ) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            user_id: user_id.into(),
            prompt: prompt.into(),
            aspect_ratio,
            model,
            reference_image_url: None,
            parent_video_id: None,
            state: PipelineState::Received,
            final_status: RunStatus::Processing,
            progress: PipelineState::Received.progress(),
            scenes: Vec::new(),
            artifacts: Vec::new(),
            music_url: None,
            composed_url: None,
            captioned_url: None,
            final_url: None,
            stages: Vec::new(),
            error_stage: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_reference_image(mut self, url: Option<String>) -> Self {
        self.reference_image_url = url;
        self
    }

    pub fn with_parent(mut self, parent: VideoId) -> Self {
        self.parent_video_id = Some(parent);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.final_status.is_terminal()
    }

    pub fn is_revision(&self) -> bool {
        self.parent_video_id.is_some()
    }

    fn ensure_mutable(&self) -> Result<(), RunError> {
        if self.is_terminal() {
            return Err(RunError::Terminal(self.video_id.clone(), self.final_status));
        }
        Ok(())
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), RunError> {
        self.ensure_mutable()?;
        if !self.state.can_advance_to(next) {
            return Err(RunError::InvalidTransition { from: self.state, to: next });
        }
        self.state = next;
        if next != PipelineState::Failed {
            self.progress = next.progress();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    fn report(&mut self, stage: Stage, status: StageStatus, message: Option<String>) {
        self.stages.push(StageReport::new(stage, status, message));
    }

    /// Scenes scripted (or revised) for this run.
    pub fn record_scenes(&mut self, scenes: Vec<Scene>) -> Result<(), RunError> {
        if scenes.is_empty() {
            return Err(RunError::MissingInput("scene set is empty".into()));
        }
        self.advance(PipelineState::ScenesReady)?;
        self.scenes = scenes;
        self.report(Stage::SceneGeneration, StageStatus::Completed, None);
        Ok(())
    }

    /// Per-scene assets resolved. The stage is degraded when any scene is.
    pub fn record_assets(&mut self, artifacts: Vec<SceneArtifacts>) -> Result<(), RunError> {
        if !artifacts.iter().any(SceneArtifacts::is_composable) {
            return Err(RunError::MissingInput("no composable scene".into()));
        }
        self.advance(PipelineState::AssetsReady)?;
        let degraded: Vec<String> = artifacts
            .iter()
            .filter(|a| a.degraded)
            .map(|a| a.scene_number.to_string())
            .collect();
        self.artifacts = artifacts;
        if degraded.is_empty() {
            self.report(Stage::AssetGeneration, StageStatus::Completed, None);
        } else {
            self.report(
                Stage::AssetGeneration,
                StageStatus::Degraded,
                Some(format!("degraded scenes: {}", degraded.join(", "))),
            );
        }
        Ok(())
    }

    /// Seed a revision with artifacts inherited from its parent run.
    pub fn inherit_artifacts(&mut self, artifacts: Vec<SceneArtifacts>) -> Result<(), RunError> {
        self.ensure_mutable()?;
        self.artifacts = artifacts;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Composed (merged) video available.
    pub fn record_composition(&mut self, url: impl Into<String>) -> Result<(), RunError> {
        self.advance(PipelineState::Composed)?;
        self.composed_url = Some(url.into());
        self.report(Stage::Composition, StageStatus::Completed, None);
        Ok(())
    }

    /// Revision with no asset changes: reuse the parent's composed video.
    pub fn reuse_composition(&mut self, url: impl Into<String>) -> Result<(), RunError> {
        self.advance(PipelineState::Composed)?;
        self.composed_url = Some(url.into());
        self.report(
            Stage::Composition,
            StageStatus::Completed,
            Some("reused from parent run".into()),
        );
        Ok(())
    }

    /// Music mixed into the composed video; `video_url` is the mixed output.
    pub fn record_music_applied(
        &mut self,
        music_url: impl Into<String>,
        video_url: impl Into<String>,
    ) -> Result<(), RunError> {
        self.advance(PipelineState::MusicApplied)?;
        self.music_url = Some(music_url.into());
        self.final_url = Some(video_url.into());
        self.report(Stage::Music, StageStatus::Completed, None);
        Ok(())
    }

    /// Music stage skipped; the composed video continues without music.
    pub fn record_music_skipped(&mut self, reason: impl Into<String>) -> Result<(), RunError> {
        self.advance(PipelineState::MusicSkipped)?;
        self.final_url = self.composed_url.clone();
        self.report(Stage::Music, StageStatus::Skipped, Some(reason.into()));
        Ok(())
    }

    /// Captioning resolved. A degraded caption carries the uncaptioned URL.
    pub fn record_captions(
        &mut self,
        url: impl Into<String>,
        degraded_reason: Option<String>,
    ) -> Result<(), RunError> {
        self.advance(PipelineState::Captioned)?;
        let url = url.into();
        match degraded_reason {
            None => {
                self.captioned_url = Some(url.clone());
                self.report(Stage::Captioning, StageStatus::Completed, None);
            }
            Some(reason) => {
                self.report(Stage::Captioning, StageStatus::Degraded, Some(reason));
            }
        }
        self.final_url = Some(url);
        Ok(())
    }

    /// Mark the run completed. Requires a final URL.
    pub fn complete(&mut self) -> Result<RunOutcome, RunError> {
        if self.final_url.is_none() {
            return Err(RunError::MissingInput("final video URL".into()));
        }
        self.advance(PipelineState::Completed)?;
        self.final_status = RunStatus::Completed;
        self.completed_at = Some(self.updated_at);
        self.outcome()
            .ok_or_else(|| RunError::MissingInput("final video URL".into()))
    }

    /// Mark the run failed at `stage`.
    pub fn fail(&mut self, stage: Stage, message: impl Into<String>) -> Result<RunOutcome, RunError> {
        self.advance(PipelineState::Failed)?;
        let message = message.into();
        self.final_status = RunStatus::Failed;
        self.error_stage = Some(stage);
        self.error_message = Some(message.clone());
        self.completed_at = Some(self.updated_at);
        self.report(stage, StageStatus::Failed, Some(message.clone()));
        Ok(RunOutcome::Failed { video_id: self.video_id.clone(), stage, message })
    }

    fn stages_with(&self, status: StageStatus) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.stage)
            .collect()
    }

    pub fn degraded_stages(&self) -> Vec<Stage> {
        self.stages_with(StageStatus::Degraded)
    }

    pub fn skipped_stages(&self) -> Vec<Stage> {
        self.stages_with(StageStatus::Skipped)
    }

    /// Latest report for a stage.
    pub fn stage_report(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().rev().find(|r| r.stage == stage)
    }

    /// Structured outcome of a terminal run; `None` while processing.
    pub fn outcome(&self) -> Option<RunOutcome> {
        match self.final_status {
            RunStatus::Processing => None,
            RunStatus::Completed => Some(RunOutcome::Completed {
                video_id: self.video_id.clone(),
                final_url: self.final_url.clone()?,
                degraded_stages: self.degraded_stages(),
                skipped_stages: self.skipped_stages(),
            }),
            RunStatus::Failed => Some(RunOutcome::Failed {
                video_id: self.video_id.clone(),
                stage: self.error_stage?,
                message: self.error_message.clone().unwrap_or_default(),
            }),
        }
    }
}
