//! Stage functions.
//!
//! Each stage wraps the remote task client and the poller with its own
//! parameters, deadline and fallback policy:
//!
//! | Stage | On failure |
//! |---|---|
//! | scenes | run aborts |
//! | assets | scene degraded; run aborts only when no scene is composable |
//! | composition | run aborts |
//! | music | stage skipped |
//! | captions | uncaptioned input returned as a degraded result |

mod assets;
mod captions;
mod compose;
mod music;
mod scenes;

use std::time::Duration;

use reel_remote::{Poller, RemoteTaskClient, TaskError, TaskParams};

use crate::config::PipelineConfig;

pub use assets::{generate_assets, SceneJob};
pub use captions::caption;
pub use compose::compose;
pub use music::{add_music, music_prompt, MusicOutcome, DEFAULT_MUSIC_PROMPT};
pub use scenes::{revise_scenes, write_scenes};

/// Collaborators shared by the remote-backed stages of one run.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub client: &'a dyn RemoteTaskClient,
    pub config: &'a PipelineConfig,
}

impl<'a> StageContext<'a> {
    pub fn new(client: &'a dyn RemoteTaskClient, config: &'a PipelineConfig) -> Self {
        Self { client, config }
    }

    /// Submit one remote task and poll it to a terminal outcome within `max_wait`.
    pub async fn run_task(
        &self,
        params: impl Into<TaskParams>,
        max_wait: Duration,
    ) -> Result<String, TaskError> {
        let params = params.into();
        Poller::new(self.config.poll_interval, max_wait)
            .run(self.client, &params)
            .await
    }
}
