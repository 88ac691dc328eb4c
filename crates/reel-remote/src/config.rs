//! Remote processing API configuration.

use std::time::Duration;

use crate::error::ConfigError;
use crate::params::CaptionModel;

/// Immutable client configuration, built once at startup and passed into
/// [`crate::HttpRemoteTaskClient::new`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL for processing tasks (merge, music mix, captions)
    pub base_url: String,
    /// Base URL for generation tasks; falls back to `base_url`
    pub generation_base_url: Option<String>,
    /// Bearer token sent with every request
    pub api_key: Option<String>,
    /// Timeout for a single submission request
    pub submit_timeout: Duration,
    /// Timeout for a single status request
    pub status_timeout: Duration,
    pub connect_timeout: Duration,
    pub default_caption_model: CaptionModel,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            generation_base_url: None,
            api_key: None,
            submit_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            default_caption_model: CaptionModel::default(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_generation_base_url(mut self, url: impl Into<String>) -> Self {
        self.generation_base_url = Some(trim_base(url.into()));
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("REMOTE_API_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("REMOTE_API_BASE_URL"))?;

        let default_caption_model = match std::env::var("CAPTION_MODEL_SIZE") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "CAPTION_MODEL_SIZE",
                value,
            })?,
            Err(_) => CaptionModel::default(),
        };

        let mut config = Self::new(base_url);
        config.generation_base_url = std::env::var("REMOTE_GENERATION_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(trim_base);
        config.api_key = std::env::var("REMOTE_API_KEY").ok().filter(|s| !s.is_empty());
        config.submit_timeout = Duration::from_secs(
            std::env::var("REMOTE_SUBMIT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        );
        config.status_timeout = Duration::from_secs(
            std::env::var("REMOTE_STATUS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        );
        config.connect_timeout = Duration::from_secs(
            std::env::var("REMOTE_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );
        config.default_caption_model = default_caption_model;
        Ok(config)
    }

    /// Base URL serving tasks of the given kind.
    pub fn base_for(&self, generation: bool) -> &str {
        match (&self.generation_base_url, generation) {
            (Some(url), true) => url,
            _ => &self.base_url,
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
