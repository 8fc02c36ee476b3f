// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S4 — crash recovery: the orchestrator died with three stories
//! running. Two wrote result files before death; the third's process is
//! gone without a trace. A fresh supervisor reconciles all three from
//! the filesystem alone, idempotently.

use crate::prelude::*;
use cascade_core::{AgentEntry, ResultRecord, StoryId};
use cascade_engine::Supervisor;
use cascade_storage::ProgressToken;

/// A pid that certainly refers to no live process.
const DEAD_PID: u32 = 2_000_000_000;

fn seed_running(store: &cascade_storage::StateStore<FakeClock>, story_id: &str) {
    let entry = AgentEntry {
        story_id: StoryId::new(story_id),
        agent: "codex".to_string(),
        started_at: "2026-01-01T00:00:00Z".to_string(),
        pid: Some(DEAD_PID),
        timeout_seconds: 600,
        output_log_path: Some(store.paths().story_log(story_id)),
        result_path: Some(store.paths().story_result(story_id)),
    };
    store
        .update_registry(|reg| reg.insert_running(entry))
        .unwrap();
}

#[test]
fn fresh_supervisor_reconciles_after_crash() {
    let (_dir, store, _clock) = fake_project();

    // Three stories were running when the orchestrator died
    for id in ["story-001", "story-002", "story-003"] {
        seed_running(&store, id);
    }

    // story-001 finished successfully and wrote its result
    store.write_result(&ResultRecord {
        story_id: StoryId::new("story-001"),
        success: true,
        exit_code: Some(0),
        error: None,
        completed_at: "2026-01-01T00:05:00Z".to_string(),
        output_file: None,
    });
    // story-002 failed and wrote its result
    store.write_result(&ResultRecord {
        story_id: StoryId::new("story-002"),
        success: false,
        exit_code: Some(1),
        error: Some("tests failed".to_string()),
        completed_at: "2026-01-01T00:06:00Z".to_string(),
        output_file: None,
    });
    // story-003 wrote nothing and its process is dead

    let supervisor = Supervisor::new(store.clone());
    let report = supervisor.reconcile().unwrap();

    assert_eq!(report.completed, vec![StoryId::new("story-001")]);
    assert_eq!(report.failed.len(), 2);

    let reg = store.read_registry();
    assert!(reg.running.is_empty());
    assert_eq!(reg.completed.len(), 1);
    assert_eq!(reg.failed.len(), 2);
    let story_003 = reg
        .failed
        .iter()
        .find(|e| e.story_id == "story-003")
        .unwrap();
    assert_eq!(story_003.error, "Process exited unexpectedly");

    // Idempotence: a second pass changes nothing and appends nothing
    let lines_before = store.progress().read().len();
    let second = supervisor.reconcile().unwrap();
    assert!(!second.changed());
    assert_eq!(store.progress().read().len(), lines_before);

    // One terminal progress line per story
    let progress = store.progress().read();
    assert_eq!(
        progress
            .iter()
            .filter(|e| e.token == Some(ProgressToken::Complete))
            .count(),
        1
    );
    assert_eq!(
        progress
            .iter()
            .filter(|e| e.token == Some(ProgressToken::Failed))
            .count(),
        2
    );
}
