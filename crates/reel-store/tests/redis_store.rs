//! Redis run store integration tests.

use reel_models::{AspectRatio, PipelineRun, Scene, Stage, VideoId, VideoModel};
use reel_store::{RedisRunStore, RunStore, StoreConfig, StoreError};

fn store() -> RedisRunStore {
    let config = StoreConfig {
        key_prefix: "reel:test:run".to_string(),
        record_ttl_secs: Some(300),
        ..StoreConfig::from_env()
    };
    RedisRunStore::new(config).expect("Failed to create store")
}

fn run() -> PipelineRun {
    PipelineRun::new(
        VideoId::new(),
        "test_user_123",
        "sparkling water commercial",
        AspectRatio::Portrait,
        VideoModel::Standard,
    )
}

/// Round trip a run through Redis and advance it.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_run_lifecycle() {
    let store = store();
    let mut r = run();

    store.create(&r).await.expect("Failed to create run");
    r.record_scenes(vec![Scene::new(1, "bottle on sand", "Stay fresh.")])
        .unwrap();
    store.save(&r).await.expect("Failed to save run");

    let loaded = store
        .load(&r.video_id)
        .await
        .expect("Failed to load run")
        .expect("Run missing");
    assert_eq!(loaded.state, r.state);
    assert_eq!(loaded.scenes.len(), 1);
}

/// Duplicate creation and writes after a terminal state are refused.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_terminal_run_is_protected() {
    let store = store();
    let mut r = run();

    store.create(&r).await.expect("Failed to create run");
    assert!(matches!(store.create(&r).await, Err(StoreError::AlreadyExists(_))));

    r.fail(Stage::SceneGeneration, "writer unavailable").unwrap();
    store.save(&r).await.expect("Failed to save failed run");

    let stale = PipelineRun { final_status: Default::default(), ..r.clone() };
    assert!(matches!(store.save(&stale).await, Err(StoreError::Terminal(_))));
}
