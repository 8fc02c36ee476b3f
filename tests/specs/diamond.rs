// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S1 — diamond dependency: four stories drain in three batches, and
//! the progress log orders completions with the dependency edges.

use crate::prelude::*;
use cascade_backends::AgentOverrides;
use cascade_engine::{Orchestrator, OrchestratorConfig, RunMode, RunOutcome};
use cascade_storage::ProgressToken;
use std::time::Duration;

#[tokio::test]
async fn diamond_dependency_drains_in_dependency_order() {
    let (_dir, store) = project();
    store
        .write_plan(&plan_with(vec![
            story("story-001", &[]),
            story("story-002", &["story-001"]),
            story("story-003", &["story-001"]),
            story("story-004", &["story-002", "story-003"]),
        ]))
        .unwrap();
    write_stub_agent(&store, "echo done {story_id}", 60);

    let config = OrchestratorConfig {
        poll_interval: Duration::from_millis(25),
        overrides: AgentOverrides {
            global_agent: Some("stub".to_string()),
            no_fallback: true,
            ..AgentOverrides::default()
        },
        ..OrchestratorConfig::default()
    };
    let mut orch = Orchestrator::new(store.clone(), config);

    let outcome = orch.run(RunMode::UntilComplete).await.unwrap();
    assert_eq!(outcome, RunOutcome::Complete);

    let plan = store.read_plan().unwrap();
    assert!(plan.stories.iter().all(|s| s.status == StoryStatus::Complete));

    // Exactly four [COMPLETE] lines, ordered with the dependency edges
    let completions: Vec<String> = store
        .progress()
        .read()
        .into_iter()
        .filter(|e| e.token == Some(ProgressToken::Complete))
        .map(|e| e.story_id.to_string())
        .collect();
    assert_eq!(completions.len(), 4);

    let pos = |id: &str| completions.iter().position(|c| c == id).unwrap();
    assert!(pos("story-001") < pos("story-002"));
    assert!(pos("story-001") < pos("story-003"));
    assert!(pos("story-002") < pos("story-004"));
    assert!(pos("story-003") < pos("story-004"));
}
