//! Scene generation stage.

use std::collections::HashSet;
use std::time::Duration;

use reel_models::{FailureKind, Scene, StageFailure};

use crate::script::{SceneBrief, SceneWriter, ScriptError};

/// Script a fresh scene set, bounded by `timeout`. Any failure aborts the run.
pub async fn write_scenes(
    writer: &dyn SceneWriter,
    brief: &SceneBrief,
    timeout: Duration,
) -> Result<Vec<Scene>, StageFailure> {
    let scenes = tokio::time::timeout(timeout, writer.write_scenes(brief))
        .await
        .map_err(|_| ScriptError::Timeout(timeout).to_failure())?
        .map_err(|e| e.to_failure())?;
    ordered(scenes)
}

/// Rewrite a parent's scene set for a revision request, bounded by `timeout`.
pub async fn revise_scenes(
    writer: &dyn SceneWriter,
    parent: &[Scene],
    request: &str,
    timeout: Duration,
) -> Result<Vec<Scene>, StageFailure> {
    let scenes = tokio::time::timeout(timeout, writer.revise_scenes(parent, request))
        .await
        .map_err(|_| ScriptError::Timeout(timeout).to_failure())?
        .map_err(|e| e.to_failure())?;
    ordered(scenes)
}

/// Sort by scene number; reject empty sets and duplicate numbers.
fn ordered(mut scenes: Vec<Scene>) -> Result<Vec<Scene>, StageFailure> {
    if scenes.is_empty() {
        return Err(StageFailure::new(FailureKind::RemoteFailure, "scene writer returned no scenes"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = scenes.iter().find(|s| !seen.insert(s.scene_number)) {
        return Err(StageFailure::new(
            FailureKind::RemoteFailure,
            format!("duplicate scene number {}", dup.scene_number),
        ));
    }
    scenes.sort_by_key(|s| s.scene_number);
    Ok(scenes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_sorts_and_rejects_duplicates() {
        let scenes = vec![Scene::new(2, "b", "two"), Scene::new(1, "a", "one")];
        let sorted = ordered(scenes).unwrap();
        assert_eq!(sorted[0].scene_number, 1);

        let dup = vec![Scene::new(1, "a", "one"), Scene::new(1, "b", "two")];
        let failure = ordered(dup).unwrap_err();
        assert!(failure.message.contains("duplicate scene number 1"));

        assert!(ordered(Vec::new()).is_err());
    }
}
