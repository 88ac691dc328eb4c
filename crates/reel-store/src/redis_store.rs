//! Redis-backed run store.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use reel_models::{PipelineRun, VideoId};

use crate::error::{StoreError, StoreResult};
use crate::store::RunStore;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix for run documents
    pub key_prefix: String,
    /// Expiry for run documents, in seconds. `None` keeps them forever.
    pub record_ttl_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "reel:run".to_string(),
            record_ttl_secs: None,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("RUN_KEY_PREFIX").unwrap_or_else(|_| "reel:run".to_string()),
            record_ttl_secs: std::env::var("RUN_RECORD_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// [`RunStore`] keeping one JSON document per run at `{prefix}:{video_id}`.
pub struct RedisRunStore {
    client: redis::Client,
    config: StoreConfig,
}

impl RedisRunStore {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    fn key(&self, video_id: &VideoId) -> String {
        format!("{}:{}", self.config.key_prefix, video_id)
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::connection_failed(e.to_string()))
    }

    async fn write(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        key: &str,
        payload: &str,
    ) -> StoreResult<()> {
        match self.config.record_ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, payload, ttl).await?,
            None => conn.set::<_, _, ()>(key, payload).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl RunStore for RedisRunStore {
    async fn create(&self, run: &PipelineRun) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let key = self.key(&run.video_id);
        let payload = serde_json::to_string(run)?;

        let created: bool = conn.set_nx(&key, &payload).await?;
        if !created {
            return Err(StoreError::AlreadyExists(run.video_id.clone()));
        }
        if let Some(ttl) = self.config.record_ttl_secs {
            conn.expire::<_, ()>(&key, ttl as i64).await?;
        }

        debug!(video_id = %run.video_id, "Created run record");
        Ok(())
    }

    async fn save(&self, run: &PipelineRun) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let key = self.key(&run.video_id);

        // Single writer per run, so read-then-write needs no transaction.
        let existing: Option<String> = conn.get(&key).await?;
        let existing: PipelineRun = match existing {
            Some(json) => serde_json::from_str(&json)?,
            None => return Err(StoreError::NotFound(run.video_id.clone())),
        };
        if existing.is_terminal() {
            return Err(StoreError::Terminal(run.video_id.clone()));
        }

        let payload = serde_json::to_string(run)?;
        self.write(&mut conn, &key, &payload).await?;

        debug!(
            video_id = %run.video_id,
            state = %run.state,
            progress = run.progress,
            "Saved run record"
        );
        Ok(())
    }

    async fn load(&self, video_id: &VideoId) -> StoreResult<Option<PipelineRun>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.key(video_id)).await?;
        payload
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }
}
