//! Worker and pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use reel_remote::{CaptionModel, DEFAULT_POLL_INTERVAL};

fn env_or<T: FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(var: &str, default: u64) -> Duration {
    Duration::from_secs(env_or(var, default))
}

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent pipeline runs
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            shutdown_timeout: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(1800), // longer than any single run
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: 2,
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT", 60),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS", 30),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS", 1800),
        }
        .with_max_concurrent_jobs(env_or("WORKER_MAX_JOBS", 2))
    }

    /// At least one run slot; a worker with none would never read a job.
    pub fn with_max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs.max(1);
        self
    }
}

/// Deadline for each stage or remote task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    /// Whole scene writer call (not polled)
    pub scenes: Duration,
    pub image: Duration,
    pub video: Duration,
    pub voiceover: Duration,
    /// Music synthesis
    pub music: Duration,
    /// Mixing the track into the composed video
    pub music_mix: Duration,
    pub merge: Duration,
    pub caption: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            scenes: Duration::from_secs(120),
            image: Duration::from_secs(300),
            video: Duration::from_secs(600),
            voiceover: Duration::from_secs(180),
            music: Duration::from_secs(180),
            music_mix: Duration::from_secs(300),
            merge: Duration::from_secs(480),
            caption: Duration::from_secs(600),
        }
    }
}

impl StageTimeouts {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            scenes: env_secs("SCENE_TIMEOUT_SECS", d.scenes.as_secs()),
            image: env_secs("IMAGE_TIMEOUT_SECS", d.image.as_secs()),
            video: env_secs("VIDEO_TIMEOUT_SECS", d.video.as_secs()),
            voiceover: env_secs("VOICEOVER_TIMEOUT_SECS", d.voiceover.as_secs()),
            music: env_secs("MUSIC_TIMEOUT_SECS", d.music.as_secs()),
            music_mix: env_secs("MUSIC_MIX_TIMEOUT_SECS", d.music_mix.as_secs()),
            merge: env_secs("MERGE_TIMEOUT_SECS", d.merge.as_secs()),
            caption: env_secs("CAPTION_TIMEOUT_SECS", d.caption.as_secs()),
        }
    }
}

/// Pipeline configuration, passed explicitly into the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sleep between status checks for every remote task
    pub poll_interval: Duration,
    pub timeouts: StageTimeouts,
    /// Maximum scenes whose assets are generated at once
    pub max_scene_parallel: usize,
    /// Whisper model size for caption burn-in; the binary copies it from the remote config
    pub caption_model: CaptionModel,
    /// Narration voice when a scene does not name one
    pub default_voice_id: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeouts: StageTimeouts::default(),
            max_scene_parallel: 3,
            caption_model: CaptionModel::default(),
            default_voice_id: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: env_secs("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL.as_secs()),
            timeouts: StageTimeouts::from_env(),
            max_scene_parallel: env_or("MAX_SCENE_PARALLEL", 3usize).max(1),
            caption_model: CaptionModel::default(),
            default_voice_id: std::env::var("DEFAULT_VOICE_ID").ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_caption_model(mut self, model: CaptionModel) -> Self {
        self.caption_model = model;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
