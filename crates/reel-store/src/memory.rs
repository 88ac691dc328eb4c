//! In-memory run store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use reel_models::{PipelineRun, PipelineState, VideoId};

use crate::error::{StoreError, StoreResult};
use crate::store::RunStore;

/// Process-local [`RunStore`].
///
/// Keeps a journal of every state written per run so callers can check the
/// exact sequence of recorded transitions.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<VideoId, PipelineRun>>,
    journal: RwLock<HashMap<VideoId, Vec<PipelineState>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a run as-is, bypassing the create/save checks.
    pub async fn seed(&self, run: PipelineRun) {
        self.runs.write().await.insert(run.video_id.clone(), run);
    }

    /// States recorded for a run, in write order.
    pub async fn journal(&self, video_id: &VideoId) -> Vec<PipelineState> {
        self.journal
            .read()
            .await
            .get(video_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    async fn append_journal(&self, run: &PipelineRun) {
        self.journal
            .write()
            .await
            .entry(run.video_id.clone())
            .or_default()
            .push(run.state);
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create(&self, run: &PipelineRun) -> StoreResult<()> {
        {
            let mut runs = self.runs.write().await;
            if runs.contains_key(&run.video_id) {
                return Err(StoreError::AlreadyExists(run.video_id.clone()));
            }
            runs.insert(run.video_id.clone(), run.clone());
        }
        self.append_journal(run).await;
        Ok(())
    }

    async fn save(&self, run: &PipelineRun) -> StoreResult<()> {
        {
            let mut runs = self.runs.write().await;
            match runs.get(&run.video_id) {
                None => return Err(StoreError::NotFound(run.video_id.clone())),
                Some(existing) if existing.is_terminal() => {
                    return Err(StoreError::Terminal(run.video_id.clone()));
                }
                Some(_) => {
                    runs.insert(run.video_id.clone(), run.clone());
                }
            }
        }
        self.append_journal(run).await;
        Ok(())
    }

    async fn load(&self, video_id: &VideoId) -> StoreResult<Option<PipelineRun>> {
        Ok(self.runs.read().await.get(video_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{AspectRatio, Stage, VideoModel};

    fn run(id: &str) -> PipelineRun {
        PipelineRun::new(VideoId::from(id), "user-1", "prompt", AspectRatio::Portrait, VideoModel::Standard)
    }

    #[tokio::test]
    async fn test_create_save_load() {
        let store = MemoryRunStore::new();
        let mut r = run("vid-1");
        store.create(&r).await.unwrap();

        r.progress = 42;
        store.save(&r).await.unwrap();

        let loaded = store.load(&VideoId::from("vid-1")).await.unwrap().unwrap();
        assert_eq!(loaded.progress, 42);
        assert!(store.load(&VideoId::from("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let store = MemoryRunStore::new();
        store.create(&run("vid-1")).await.unwrap();
        assert!(matches!(
            store.create(&run("vid-1")).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_save_requires_existing_run() {
        let store = MemoryRunStore::new();
        assert!(matches!(store.save(&run("ghost")).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_terminal_run_cannot_be_overwritten() {
        let store = MemoryRunStore::new();
        let mut r = run("vid-1");
        store.create(&r).await.unwrap();
        r.fail(Stage::Composition, "merge failed").unwrap();
        store.save(&r).await.unwrap();

        let mut stale = run("vid-1");
        stale.progress = 99;
        assert!(matches!(store.save(&stale).await, Err(StoreError::Terminal(_))));

        assert_eq!(
            store.journal(&VideoId::from("vid-1")).await,
            vec![PipelineState::Received, PipelineState::Failed]
        );
    }
}
