//! Poll loop behaviour under paused time with a scripted client.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use reel_models::{RemoteTask, TaskId, TaskKind, TaskSnapshot};
use reel_remote::{
    CaptionModel, CaptionParams, PollError, Poller, RemoteTaskClient, SubmitError, TaskError,
    TaskParams, TransportError, ValidationError,
};

/// Answers status checks from a script; repeats the last entry once exhausted.
struct ScriptedClient {
    script: Mutex<VecDeque<Result<TaskSnapshot, TransportError>>>,
    last: Mutex<Option<Result<TaskSnapshot, TransportError>>>,
    status_calls: AtomicU32,
    submit_calls: AtomicU32,
    hang: bool,
}

impl ScriptedClient {
    fn new(script: Vec<Result<TaskSnapshot, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            status_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            hang: false,
        }
    }

    fn hanging() -> Self {
        Self { hang: true, ..Self::new(Vec::new()) }
    }

    fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteTaskClient for ScriptedClient {
    async fn submit(&self, params: &TaskParams) -> Result<TaskId, SubmitError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        params.validate()?;
        Ok(TaskId::from("task-1"))
    }

    async fn fetch_status(
        &self,
        _task_id: &TaskId,
        _kind: TaskKind,
    ) -> Result<TaskSnapshot, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(entry) => {
                *self.last.lock().unwrap() = Some(entry.clone());
                entry
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(TaskSnapshot::running())),
        }
    }
}

fn task() -> RemoteTask {
    RemoteTask::submitted(TaskId::from("task-1"), TaskKind::Merge)
}

fn poller() -> Poller {
    Poller::new(Duration::from_secs(5), Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn test_success_stops_polling() {
    let client = ScriptedClient::new(vec![
        Ok(TaskSnapshot::queued()),
        Ok(TaskSnapshot::running()),
        Ok(TaskSnapshot::success("https://cdn.example.com/merged.mp4")),
        Ok(TaskSnapshot::running()),
    ]);
    let started = tokio::time::Instant::now();

    let url = poller().wait(&client, task()).await.unwrap();

    assert_eq!(url, "https://cdn.example.com/merged.mp4");
    assert_eq!(client.status_calls(), 3);
    // Checks at t=0, 5 and 10: immediate first check, exact interval after.
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_first_check_is_immediate() {
    let client = ScriptedClient::new(vec![Ok(TaskSnapshot::success("https://cdn.example.com/a.mp4"))]);
    let started = tokio::time::Instant::now();

    poller().wait(&client, task()).await.unwrap();

    assert_eq!(client.status_calls(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_is_terminal() {
    let client = ScriptedClient::new(vec![
        Ok(TaskSnapshot::running()),
        Ok(TaskSnapshot::failed("ffmpeg exited with code 1")),
    ]);

    let err = poller().wait(&client, task()).await.unwrap_err();

    assert_eq!(
        err,
        PollError::RemoteFailure {
            task_id: TaskId::from("task-1"),
            message: "ffmpeg exited with code 1".into(),
        }
    );
    assert!(!err.is_timeout());
    assert_eq!(client.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_never_terminal_times_out() {
    let client = ScriptedClient::new(vec![Ok(TaskSnapshot::running())]);
    let poller = Poller::new(Duration::from_secs(5), Duration::from_secs(30));
    let started = tokio::time::Instant::now();

    let err = tokio::time::timeout(Duration::from_secs(120), poller.wait(&client, task()))
        .await
        .expect("poll loop must end on its own")
        .unwrap_err();

    match err {
        PollError::TimedOut { checks, elapsed, .. } => {
            assert_eq!(checks, 6);
            assert_eq!(elapsed, Duration::from_secs(30));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    // One check per interval elapsed, no more.
    assert_eq!(client.status_calls(), 30 / 5);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_are_retried() {
    let client = ScriptedClient::new(vec![
        Err(TransportError::Timeout),
        Err(TransportError::Server { status: 502, body: "bad gateway".into() }),
        Err(TransportError::malformed("truncated body")),
        Ok(TaskSnapshot::success("https://cdn.example.com/out.mp4")),
    ]);

    let url = poller().wait(&client, task()).await.unwrap();

    assert_eq!(url, "https://cdn.example.com/out.mp4");
    assert_eq!(client.status_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_transport_errors_time_out() {
    let client = ScriptedClient::new(vec![Err(TransportError::Network("connection refused".into()))]);
    let poller = Poller::new(Duration::from_secs(5), Duration::from_secs(20));

    let err = poller.wait(&client, task()).await.unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_hung_status_check_is_bounded_by_deadline() {
    let client = ScriptedClient::hanging();
    let poller = Poller::new(Duration::from_secs(5), Duration::from_secs(15));
    let started = tokio::time::Instant::now();

    let err = poller.wait(&client, task()).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert_eq!(client.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_success_without_url_is_remote_failure() {
    let client = ScriptedClient::new(vec![Ok(TaskSnapshot {
        status: reel_models::RemoteStatus::Success,
        url: None,
        error: None,
    })]);

    let err = poller().wait(&client, task()).await.unwrap_err();

    assert!(matches!(err, PollError::RemoteFailure { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_run_validation_failure_skips_polling() {
    let client = ScriptedClient::new(vec![Ok(TaskSnapshot::success("https://cdn.example.com/x.mp4"))]);
    let params = TaskParams::from(CaptionParams::new("relative/path.mp4", CaptionModel::Small));

    let err = poller().run(&client, &params).await.unwrap_err();

    assert!(matches!(
        err,
        TaskError::Submit(SubmitError::Validation(ValidationError::InvalidUrl { .. }))
    ));
    assert_eq!(client.status_calls(), 0);
}
