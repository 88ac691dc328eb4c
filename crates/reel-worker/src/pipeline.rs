//! Pipeline orchestrator.
//!
//! Drives one run through the state machine
//!
//! ```text
//! received -> scenes_ready -> assets_ready -> composed
//!          -> music_applied | music_skipped -> captioned -> completed
//! ```
//!
//! with `failed` reachable from every non-terminal state. Stages run strictly
//! in sequence and every transition is saved through the [`RunStore`] before
//! the next stage starts. Each entry point hands back exactly one
//! [`RunOutcome`].

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use reel_models::{
    GenerateVideoRequest, PipelineRun, ReviseVideoRequest, RunError, RunOutcome, RunStatus,
    Scene, SceneArtifacts, Stage, StageFailure, StageResult, StageStatus, VideoId,
};
use reel_remote::RemoteTaskClient;
use reel_store::{RunStore, StoreError};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::revision::RevisionPlan;
use crate::script::{SceneBrief, SceneWriter};
use crate::stages::{self, MusicOutcome, SceneJob, StageContext};

/// Failure message for runs whose worker vanished mid-run.
pub const ABANDONED_RUN_MESSAGE: &str = "worker lost before completion";

/// Why a run stopped short of completion.
#[derive(Debug)]
struct Abort {
    stage: Stage,
    message: String,
}

impl Abort {
    fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }

    fn from_failure(stage: Stage, failure: StageFailure) -> Self {
        Self::new(stage, failure.to_string())
    }
}

fn record(stage: Stage, result: Result<(), RunError>) -> Result<(), Abort> {
    result.map_err(|e| Abort::new(stage, e.to_string()))
}

/// Orchestrates generation and revision runs.
pub struct Pipeline {
    client: Arc<dyn RemoteTaskClient>,
    writer: Arc<dyn SceneWriter>,
    store: Arc<dyn RunStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn RemoteTaskClient>,
        writer: Arc<dyn SceneWriter>,
        store: Arc<dyn RunStore>,
        config: PipelineConfig,
    ) -> Self {
        Self { client, writer, store, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn stage_context(&self) -> StageContext<'_> {
        StageContext::new(self.client.as_ref(), &self.config)
    }

    /// Generate a new video from a prompt.
    ///
    /// Returns `Err` only when no run could be started: the store refused to
    /// create the record, or the same video is already being produced.
    pub async fn generate(&self, request: GenerateVideoRequest) -> WorkerResult<RunOutcome> {
        let logger = RunLogger::new(&request.video_id, "generate");
        let span = logger.create_span();

        async move {
            let mut run = PipelineRun::new(
                request.video_id,
                request.user_id,
                request.prompt,
                request.aspect_ratio,
                request.model,
            )
            .with_reference_image(request.reference_image_url);

            if let Some(outcome) = self.start(&run, &logger).await? {
                return Ok(outcome);
            }
            logger.log_start(&format!("{} scenes at {}", run.model.scene_count(), run.aspect_ratio));

            let started = Instant::now();
            let result = self.drive_generation(&mut run, &logger).await;
            Ok(self.finish(run, result, &logger, started).await)
        }
        .instrument(span)
        .await
    }

    /// Revise a completed video. The parent run is read, never written.
    pub async fn revise(&self, request: ReviseVideoRequest) -> WorkerResult<RunOutcome> {
        let logger = RunLogger::new(&request.video_id, "revise");
        let span = logger.create_span();

        async move {
            let parent = self.store.load(&request.parent_video_id).await?;

            let aspect_ratio = request
                .aspect_ratio
                .or_else(|| parent.as_ref().map(|p| p.aspect_ratio))
                .unwrap_or_default();
            let model = parent.as_ref().map(|p| p.model).unwrap_or_default();
            let reference = request
                .reference_image_url
                .clone()
                .or_else(|| parent.as_ref().and_then(|p| p.reference_image_url.clone()));

            let mut run = PipelineRun::new(
                request.video_id.clone(),
                request.user_id.clone(),
                request.revision_request.clone(),
                aspect_ratio,
                model,
            )
            .with_reference_image(reference)
            .with_parent(request.parent_video_id.clone());

            if let Some(outcome) = self.start(&run, &logger).await? {
                return Ok(outcome);
            }
            logger.log_start(&format!("revising {}", request.parent_video_id));

            let started = Instant::now();
            let result = match parent {
                Some(parent) => self.drive_revision(&mut run, &parent, &logger).await,
                None => Err(Abort::new(
                    Stage::Revision,
                    format!("parent run {} not found", request.parent_video_id),
                )),
            };
            Ok(self.finish(run, result, &logger, started).await)
        }
        .instrument(span)
        .await
    }

    /// Close out a run whose worker went away before finishing it.
    ///
    /// Only called for deliveries reclaimed from another consumer, which
    /// happens after the message sat idle longer than any run may take. The
    /// run is failed in place; it is not restarted.
    pub async fn resolve_abandoned(&self, video_id: &VideoId) -> WorkerResult<RunOutcome> {
        let logger = RunLogger::new(video_id, "recover");
        let Some(mut run) = self.store.load(video_id).await? else {
            return Err(WorkerError::job_failed(format!("run {video_id} vanished during recovery")));
        };
        if let Some(outcome) = run.outcome() {
            return Ok(outcome);
        }

        let interrupted = run.state;
        let outcome = run
            .fail(Stage::Persistence, ABANDONED_RUN_MESSAGE)
            .map_err(|e| WorkerError::job_failed(e.to_string()))?;
        self.store.save(&run).await?;

        logger.log_error(
            Stage::Persistence,
            &format!("{ABANDONED_RUN_MESSAGE} (last recorded state {interrupted})"),
        );
        metrics::record_stage(Stage::Persistence, StageStatus::Failed);
        Ok(outcome)
    }

    /// Create the run record. A redelivered request for a finished run gets
    /// the stored outcome back.
    async fn start(&self, run: &PipelineRun, logger: &RunLogger) -> WorkerResult<Option<RunOutcome>> {
        match self.store.create(run).await {
            Ok(()) => Ok(None),
            Err(StoreError::AlreadyExists(video_id)) => {
                let existing = self.store.load(&video_id).await?;
                match existing.and_then(|r| r.outcome()) {
                    Some(outcome) => {
                        logger.log_completion("run already finished, returning stored outcome");
                        Ok(Some(outcome))
                    }
                    None => Err(WorkerError::RunInProgress(video_id)),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn drive_generation(
        &self,
        run: &mut PipelineRun,
        logger: &RunLogger,
    ) -> Result<RunOutcome, Abort> {
        let brief = SceneBrief {
            prompt: run.prompt.clone(),
            model: run.model,
            aspect_ratio: run.aspect_ratio,
            has_reference_image: run.reference_image_url.is_some(),
        };
        let scenes = stages::write_scenes(self.writer.as_ref(), &brief, self.config.timeouts.scenes)
            .await
            .map_err(|f| Abort::from_failure(Stage::SceneGeneration, f))?;
        self.commit_scenes(run, scenes, logger).await?;

        let jobs = run.scenes.iter().cloned().map(SceneJob::fresh).collect();
        self.commit_assets(run, jobs, logger).await?;

        self.finish_stages(run, None, None, logger).await
    }

    async fn drive_revision(
        &self,
        run: &mut PipelineRun,
        parent: &PipelineRun,
        logger: &RunLogger,
    ) -> Result<RunOutcome, Abort> {
        check_parent(run, parent)?;

        let revised = stages::revise_scenes(
            self.writer.as_ref(),
            &parent.scenes,
            &run.prompt,
            self.config.timeouts.scenes,
        )
        .await
        .map_err(|f| Abort::from_failure(Stage::SceneGeneration, f))?;

        let plan = RevisionPlan::diff(&parent.scenes, &revised, parent.aspect_ratio != run.aspect_ratio)
            .map_err(|e| Abort::new(Stage::Revision, e.to_string()))?;
        self.commit_scenes(run, revised, logger).await?;
        logger.log_stage(Stage::Revision, &plan.summary());

        let music_track = if plan.regenerate_music { None } else { parent.music_url.clone() };
        let jobs = plan.scene_jobs(&run.scenes, &parent.artifacts);

        match parent.composed_url.clone() {
            Some(composed) if jobs.iter().all(SceneJob::is_noop) => {
                record(Stage::Revision, run.inherit_artifacts(parent.artifacts.clone()))?;
                self.finish_stages(run, Some(composed), music_track, logger).await
            }
            _ => {
                self.commit_assets(run, jobs, logger).await?;
                self.finish_stages(run, None, music_track, logger).await
            }
        }
    }

    async fn commit_scenes(
        &self,
        run: &mut PipelineRun,
        scenes: Vec<Scene>,
        logger: &RunLogger,
    ) -> Result<(), Abort> {
        record(Stage::SceneGeneration, run.record_scenes(scenes))?;
        self.persist(run).await?;
        report_stage(run, Stage::SceneGeneration, logger);
        Ok(())
    }

    async fn commit_assets(
        &self,
        run: &mut PipelineRun,
        jobs: Vec<SceneJob>,
        logger: &RunLogger,
    ) -> Result<(), Abort> {
        let artifacts = stages::generate_assets(
            &self.stage_context(),
            jobs,
            run.aspect_ratio,
            run.reference_image_url.as_deref(),
        )
        .await;

        if !artifacts.iter().any(SceneArtifacts::is_composable) {
            let causes: Vec<String> = artifacts
                .iter()
                .filter_map(|a| a.errors.first().map(|e| format!("scene {}: {e}", a.scene_number)))
                .collect();
            return Err(Abort::new(
                Stage::AssetGeneration,
                format!("no scene has both a clip and a voiceover ({})", causes.join("; ")),
            ));
        }

        record(Stage::AssetGeneration, run.record_assets(artifacts))?;
        self.persist(run).await?;
        report_stage(run, Stage::AssetGeneration, logger);
        Ok(())
    }

    /// Composition, music and captions, then completion.
    ///
    /// `reuse_composed` starts the run at `composed` with an existing video;
    /// `music_track` mixes an existing track instead of synthesizing one.
    async fn finish_stages(
        &self,
        run: &mut PipelineRun,
        reuse_composed: Option<String>,
        music_track: Option<String>,
        logger: &RunLogger,
    ) -> Result<RunOutcome, Abort> {
        let ctx = self.stage_context();

        match reuse_composed {
            Some(url) => record(Stage::Composition, run.reuse_composition(url))?,
            None => {
                let url = stages::compose(&ctx, &run.artifacts, run.aspect_ratio)
                    .await
                    .into_url()
                    .map_err(|f| Abort::from_failure(Stage::Composition, f))?;
                record(Stage::Composition, run.record_composition(url))?;
            }
        }
        self.persist(run).await?;
        report_stage(run, Stage::Composition, logger);

        let composed_url = run
            .composed_url
            .clone()
            .ok_or_else(|| Abort::new(Stage::Composition, "composed video URL missing"))?;
        let music = stages::add_music(&ctx, &composed_url, &run.scenes, music_track.as_deref()).await;
        let recorded = match music {
            MusicOutcome::Applied { music_url, video_url } => run.record_music_applied(music_url, video_url),
            MusicOutcome::Skipped { reason } => run.record_music_skipped(reason),
        };
        record(Stage::Music, recorded)?;
        self.persist(run).await?;
        report_stage(run, Stage::Music, logger);

        let input = run
            .final_url
            .clone()
            .ok_or_else(|| Abort::new(Stage::Music, "video URL missing after music stage"))?;
        let captioned = stages::caption(&ctx, &input).await;
        let recorded = match captioned {
            StageResult::Produced { url } => run.record_captions(url, None),
            StageResult::Degraded { url, reason } => run.record_captions(url, Some(reason)),
            StageResult::Failed(failure) => run.record_captions(input, Some(failure.to_string())),
        };
        record(Stage::Captioning, recorded)?;
        self.persist(run).await?;
        report_stage(run, Stage::Captioning, logger);

        let outcome = run
            .complete()
            .map_err(|e| Abort::new(Stage::Captioning, e.to_string()))?;
        self.persist(run).await?;
        Ok(outcome)
    }

    async fn persist(&self, run: &PipelineRun) -> Result<(), Abort> {
        self.store
            .save(run)
            .await
            .map_err(|e| Abort::new(Stage::Persistence, format!("failed to record {}: {e}", run.state)))
    }

    async fn finish(
        &self,
        mut run: PipelineRun,
        result: Result<RunOutcome, Abort>,
        logger: &RunLogger,
        started: Instant,
    ) -> RunOutcome {
        let outcome = match result {
            Ok(outcome) => {
                let mut notes = Vec::new();
                if let RunOutcome::Completed { degraded_stages, skipped_stages, .. } = &outcome {
                    notes.extend(degraded_stages.iter().map(|s| format!("{s} degraded")));
                    notes.extend(skipped_stages.iter().map(|s| format!("{s} skipped")));
                }
                logger.log_completion(&format!(
                    "{} in {:.1}s{}",
                    run.final_url.as_deref().unwrap_or_default(),
                    started.elapsed().as_secs_f64(),
                    if notes.is_empty() { String::new() } else { format!(" ({})", notes.join(", ")) }
                ));
                outcome
            }
            Err(abort) => self.abort(&mut run, abort, logger).await,
        };
        metrics::record_run(logger.operation(), &outcome, started.elapsed().as_secs_f64());
        outcome
    }

    /// Record the failure on the run and turn it into the run's outcome.
    async fn abort(&self, run: &mut PipelineRun, abort: Abort, logger: &RunLogger) -> RunOutcome {
        logger.log_error(abort.stage, &abort.message);
        metrics::record_stage(abort.stage, StageStatus::Failed);

        match run.fail(abort.stage, abort.message.clone()) {
            Ok(outcome) => {
                if let Err(e) = self.store.save(run).await {
                    logger.log_error(Stage::Persistence, &format!("failed to record run failure: {e}"));
                }
                outcome
            }
            // Completed in memory but never durably recorded.
            Err(_) => RunOutcome::Failed {
                video_id: run.video_id.clone(),
                stage: abort.stage,
                message: abort.message,
            },
        }
    }
}

fn check_parent(run: &PipelineRun, parent: &PipelineRun) -> Result<(), Abort> {
    let id = &parent.video_id;
    if parent.user_id != run.user_id {
        return Err(Abort::new(Stage::Revision, format!("parent run {id} belongs to another user")));
    }
    if parent.final_status != RunStatus::Completed {
        return Err(Abort::new(
            Stage::Revision,
            format!("parent run {id} is {}, only completed runs can be revised", parent.final_status),
        ));
    }
    if parent.scenes.is_empty() {
        return Err(Abort::new(Stage::Revision, format!("parent run {id} has no scenes")));
    }
    Ok(())
}

fn report_stage(run: &PipelineRun, stage: Stage, logger: &RunLogger) {
    let Some(report) = run.stage_report(stage) else {
        return;
    };
    metrics::record_stage(stage, report.status);
    let message = report.message.as_deref().unwrap_or(report.status.as_str());
    match report.status {
        StageStatus::Degraded | StageStatus::Skipped => logger.log_warning(stage, message),
        _ => logger.log_stage(stage, message),
    }
}
