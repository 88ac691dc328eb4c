//! Fakes shared by the pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reel_models::{Scene, TaskId, TaskKind, TaskSnapshot};
use reel_remote::{RemoteTaskClient, SubmitError, TaskParams, TransportError};
use reel_store::MemoryRunStore;
use reel_worker::{Pipeline, PipelineConfig, SceneBrief, SceneWriter, ScriptError};

/// How the fake remote resolves a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail(String),
    /// Stays `running` forever
    Hang,
}

struct Rule {
    kind: TaskKind,
    /// Substring of the JSON request body; `None` matches every task of the kind
    needle: Option<String>,
    behavior: Behavior,
}

/// In-process remote processing API. Every task resolves on its first
/// status check unless a rule says otherwise.
#[derive(Default)]
pub struct FakeRemote {
    rules: Mutex<Vec<Rule>>,
    submissions: Mutex<Vec<TaskParams>>,
    tasks: Mutex<HashMap<TaskId, TaskSnapshot>>,
    next_id: AtomicU32,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, kind: TaskKind, behavior: Behavior) {
        self.rules.lock().unwrap().push(Rule { kind, needle: None, behavior });
    }

    /// Apply `behavior` only to tasks whose request body contains `needle`.
    pub fn on_matching(&self, kind: TaskKind, needle: &str, behavior: Behavior) {
        self.rules.lock().unwrap().push(Rule {
            kind,
            needle: Some(needle.to_string()),
            behavior,
        });
    }

    pub fn reset_rules(&self) {
        self.rules.lock().unwrap().clear();
    }

    pub fn clear_submissions(&self) {
        self.submissions.lock().unwrap().clear();
    }

    pub fn submissions(&self) -> Vec<TaskParams> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn count(&self, kind: TaskKind) -> usize {
        self.submissions().iter().filter(|p| p.kind() == kind).count()
    }

    pub fn last(&self, kind: TaskKind) -> Option<TaskParams> {
        self.submissions().into_iter().rev().find(|p| p.kind() == kind)
    }

    fn behavior_for(&self, params: &TaskParams) -> Behavior {
        let body = params.body().map(|v| v.to_string()).unwrap_or_default();
        self.rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| {
                r.kind == params.kind()
                    && r.needle.as_deref().map_or(true, |n| body.contains(n))
            })
            .map(|r| r.behavior.clone())
            .unwrap_or(Behavior::Succeed)
    }
}

#[async_trait]
impl RemoteTaskClient for FakeRemote {
    async fn submit(&self, params: &TaskParams) -> Result<TaskId, SubmitError> {
        params.validate()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let kind = params.kind();
        let id = TaskId::from_string(format!("{kind}-{n}"));

        let snapshot = match self.behavior_for(params) {
            Behavior::Succeed => TaskSnapshot::success(format!("https://cdn.example.com/{kind}/{n}")),
            Behavior::Fail(message) => TaskSnapshot::failed(message),
            Behavior::Hang => TaskSnapshot::running(),
        };
        self.tasks.lock().unwrap().insert(id.clone(), snapshot);
        self.submissions.lock().unwrap().push(params.clone());
        Ok(id)
    }

    async fn fetch_status(
        &self,
        task_id: &TaskId,
        _kind: TaskKind,
    ) -> Result<TaskSnapshot, TransportError> {
        self.tasks
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| TransportError::Server { status: 404, body: "unknown task".into() })
    }
}

/// Scene writer returning fixed scripts.
pub struct FakeWriter {
    scenes: Vec<Scene>,
    revised: Mutex<Option<Vec<Scene>>>,
    error: Option<ScriptError>,
    pub revision_requests: Mutex<Vec<String>>,
}

impl FakeWriter {
    pub fn new(scenes: Vec<Scene>) -> Arc<Self> {
        Arc::new(Self {
            scenes,
            revised: Mutex::new(None),
            error: None,
            revision_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: ScriptError) -> Arc<Self> {
        Arc::new(Self {
            scenes: Vec::new(),
            revised: Mutex::new(None),
            error: Some(error),
            revision_requests: Mutex::new(Vec::new()),
        })
    }

    /// Scenes returned by the next revision.
    pub fn set_revision(&self, scenes: Vec<Scene>) {
        *self.revised.lock().unwrap() = Some(scenes);
    }
}

#[async_trait]
impl SceneWriter for FakeWriter {
    async fn write_scenes(&self, _brief: &SceneBrief) -> Result<Vec<Scene>, ScriptError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(self.scenes.clone()),
        }
    }

    async fn revise_scenes(&self, scenes: &[Scene], request: &str) -> Result<Vec<Scene>, ScriptError> {
        self.revision_requests.lock().unwrap().push(request.to_string());
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        Ok(self
            .revised
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| scenes.to_vec()))
    }
}

pub fn three_scenes() -> Vec<Scene> {
    vec![
        Scene::new(1, "lemonade bottle on a sunny beach", "Summer in a bottle.")
            .with_video_prompt("waves roll in behind the bottle")
            .with_music_direction("bright ukulele"),
        Scene::new(2, "friends sharing lemonade at a picnic", "Made to share."),
        Scene::new(3, "bottle close-up with logo", "Grab yours today.")
            .with_video_prompt("slow zoom on the logo"),
    ]
}

pub struct Harness {
    pub remote: Arc<FakeRemote>,
    pub writer: Arc<FakeWriter>,
    pub store: Arc<MemoryRunStore>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new(writer: Arc<FakeWriter>) -> Self {
        let remote = FakeRemote::new();
        let store = Arc::new(MemoryRunStore::new());
        let pipeline = Pipeline::new(
            remote.clone(),
            writer.clone(),
            store.clone(),
            PipelineConfig::default(),
        );
        Self { remote, writer, store, pipeline }
    }

    pub fn with_scenes(scenes: Vec<Scene>) -> Self {
        Self::new(FakeWriter::new(scenes))
    }
}
