//! Remote processing API client.
//!
//! Uniform submit/status contract over every remote task kind:
//! - `POST {base}/tasks/{kind}` with the kind's JSON parameters, answered by `{task_id}`
//! - `GET {base}/tasks/{task_id}` answered by `{status, url | video_url, error}`
//!
//! The client keeps no state between calls. Parameters are validated before
//! any request is built.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

use reel_models::{RemoteStatus, TaskId, TaskKind, TaskSnapshot};

use crate::config::RemoteConfig;
use crate::error::{ConfigError, SubmitError, TransportError};
use crate::metrics::record_submission;
use crate::params::TaskParams;

/// Submit/status contract over the remote processing API.
#[async_trait]
pub trait RemoteTaskClient: Send + Sync {
    /// Validate `params` and submit them. No request is made when validation fails.
    async fn submit(&self, params: &TaskParams) -> Result<TaskId, SubmitError>;

    /// Fetch one status reading for a submitted task.
    async fn fetch_status(
        &self,
        task_id: &TaskId,
        kind: TaskKind,
    ) -> Result<TaskSnapshot, TransportError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// reqwest implementation of [`RemoteTaskClient`].
#[derive(Clone)]
pub struct HttpRemoteTaskClient {
    http: Client,
    config: RemoteConfig,
}

impl HttpRemoteTaskClient {
    /// Create a new client.
    pub fn new(config: RemoteConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("reel-remote/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn tasks_url(&self, kind: TaskKind) -> String {
        format!("{}/tasks", self.config.base_for(kind.is_generation()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send_submission(&self, params: &TaskParams) -> Result<TaskId, SubmitError> {
        let kind = params.kind();
        let body = params
            .body()
            .map_err(|e| TransportError::malformed(format!("request encoding failed: {e}")))?;

        let request = self
            .http
            .post(format!("{}/{}", self.tasks_url(kind), kind.as_str()))
            .timeout(self.config.submit_timeout)
            .json(&body);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected { status: status.as_u16(), body });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_http_status(status.as_u16(), body).into());
        }

        let parsed: SubmitResponse = response.json().await.map_err(TransportError::from)?;
        let task_id = parsed.task_id.trim();
        if task_id.is_empty() {
            return Err(TransportError::malformed("submission response has no task_id").into());
        }
        Ok(TaskId::from_string(task_id))
    }
}

#[async_trait]
impl RemoteTaskClient for HttpRemoteTaskClient {
    async fn submit(&self, params: &TaskParams) -> Result<TaskId, SubmitError> {
        let kind = params.kind();
        if let Err(e) = params.validate() {
            record_submission(kind, "invalid");
            return Err(e.into());
        }

        let span = info_span!("remote_submit", kind = %kind);
        let result = self.send_submission(params).instrument(span).await;

        match &result {
            Ok(task_id) => {
                debug!(kind = %kind, task_id = %task_id, "Remote task submitted");
                record_submission(kind, "accepted");
            }
            Err(SubmitError::Rejected { status, .. }) => {
                warn!(kind = %kind, status, "Remote task rejected");
                record_submission(kind, "rejected");
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Remote task submission failed");
                record_submission(kind, "error");
            }
        }
        result
    }

    async fn fetch_status(
        &self,
        task_id: &TaskId,
        kind: TaskKind,
    ) -> Result<TaskSnapshot, TransportError> {
        let request = self
            .http
            .get(format!("{}/{}", self.tasks_url(kind), task_id))
            .timeout(self.config.status_timeout);

        let response = self
            .authorize(request)
            .send()
            .instrument(info_span!("remote_status", kind = %kind, task_id = %task_id))
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_http_status(status.as_u16(), body));
        }

        let parsed: StatusResponse = response.json().await?;
        let remote_status = RemoteStatus::parse(&parsed.status).ok_or_else(|| {
            TransportError::malformed(format!("unknown task status '{}'", parsed.status))
        })?;

        Ok(TaskSnapshot {
            status: remote_status,
            url: parsed.url.or(parsed.video_url),
            error: parsed.error,
        })
    }
}
