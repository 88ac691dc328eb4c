//! HTTP contract tests for the chat completions scene writer.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reel_models::{AspectRatio, Scene, VideoModel};
use reel_worker::{OpenAiSceneWriter, SceneBrief, SceneWriter, ScriptConfig, ScriptError};

fn writer(server: &MockServer) -> OpenAiSceneWriter {
    let config = ScriptConfig::new("sk-test").with_api_base(server.uri());
    OpenAiSceneWriter::new(config).unwrap()
}

fn brief() -> SceneBrief {
    SceneBrief {
        prompt: "a fresh lemonade commercial for summer".into(),
        model: VideoModel::Standard,
        aspect_ratio: AspectRatio::Portrait,
        has_reference_image: false,
    }
}

fn script(count: u32) -> String {
    let scenes: Vec<_> = (1..=count)
        .map(|n| {
            json!({
                "scene_number": n,
                "visual_description": format!("shot {n} of the lemonade"),
                "image_prompt": format!("lemonade bottle, angle {n}"),
                "video_prompt": "slow push in",
                "voiceover": format!("Line {n}."),
                "music_direction": "bright ukulele",
            })
        })
        .collect();
    format!("```json\n{}\n```", json!({ "scenes": scenes }))
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

#[tokio::test]
async fn test_write_scenes_parses_fenced_script() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 2000 })))
        .respond_with(completion(&script(5)))
        .expect(1)
        .mount(&server)
        .await;

    let scenes = writer(&server).write_scenes(&brief()).await.unwrap();

    assert_eq!(scenes.len(), 5);
    assert_eq!(scenes[0].scene_number, 1);
    assert_eq!(scenes[4].image_prompt, "lemonade bottle, angle 5");
    assert_eq!(scenes[2].motion_prompt(), "slow push in");
    assert_eq!(scenes[1].voiceover, "Line 2.");
}

#[tokio::test]
async fn test_write_scenes_enforces_scene_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(&script(4)))
        .mount(&server)
        .await;

    let err = writer(&server).write_scenes(&brief()).await.unwrap_err();
    assert_eq!(err, ScriptError::SceneCount { expected: 5, actual: 4 });
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = writer(&server).write_scenes(&brief()).await.unwrap_err();
    assert_eq!(err, ScriptError::Api { status: 500, body: "upstream exploded".into() });
}

#[tokio::test]
async fn test_revise_keeps_scene_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(&script(3)))
        .mount(&server)
        .await;

    let current = vec![
        Scene::new(1, "old one", "One."),
        Scene::new(2, "old two", "Two."),
    ];
    let err = writer(&server)
        .revise_scenes(&current, "add a scene")
        .await
        .unwrap_err();
    assert_eq!(err, ScriptError::SceneCount { expected: 2, actual: 3 });
}
