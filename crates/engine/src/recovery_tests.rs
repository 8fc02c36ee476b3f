// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cascade_core::{FakeClock, Plan, Story, StoryStatus};
use cascade_storage::{ProjectPaths, StateStore};
use tempfile::TempDir;

fn store() -> (TempDir, StateStore<FakeClock>) {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(ProjectPaths::new(dir.path()), FakeClock::new());
    (dir, store)
}

#[test]
fn empty_project_needs_no_recovery() {
    let (_dir, store) = store();
    let report = detect_recovery(&store);
    assert_eq!(report.mode, None);
    assert!(!report.recovery_needed);
    assert!(report.resume_action.is_none());
}

#[test]
fn prd_with_pending_stories_needs_recovery() {
    let (_dir, store) = store();
    let mut plan = Plan::new("goal");
    plan.stories.push(Story::new("story-001", "todo"));
    store.write_plan(&plan).unwrap();

    let report = detect_recovery(&store);
    assert_eq!(report.mode, Some(RecoveryMode::Prd));
    assert!(report.recovery_needed);
    assert_eq!(report.pending, 1);
    assert_eq!(report.resume_action.as_deref(), Some("resume prd execution"));
}

#[test]
fn in_progress_stories_are_listed() {
    let (_dir, store) = store();
    let mut plan = Plan::new("goal");
    let mut story = Story::new("story-001", "working");
    story.status = StoryStatus::InProgress;
    plan.stories.push(story);
    store.write_plan(&plan).unwrap();

    let report = detect_recovery(&store);
    assert_eq!(report.in_progress, vec!["story-001"]);
    assert!(report.recovery_needed);
}

#[test]
fn drained_plan_without_checkpoint_needs_nothing() {
    let (_dir, store) = store();
    let mut plan = Plan::new("goal");
    let mut story = Story::new("story-001", "done");
    story.status = StoryStatus::Complete;
    plan.stories.push(story);
    store.write_plan(&plan).unwrap();

    let report = detect_recovery(&store);
    assert_eq!(report.mode, Some(RecoveryMode::Prd));
    assert!(!report.recovery_needed);
}

#[test]
fn checkpoint_alone_triggers_recovery() {
    let (dir, store) = store();
    store.write_plan(&Plan::new("goal")).unwrap();
    std::fs::write(dir.path().join(".execution-context.json"), "{}").unwrap();

    let report = detect_recovery(&store);
    assert!(report.recovery_needed);
}

#[test]
fn mega_plan_outranks_prd() {
    let (dir, store) = store();
    store.write_plan(&Plan::new("goal")).unwrap();
    std::fs::write(dir.path().join("mega-plan.json"), "{}").unwrap();
    std::fs::write(dir.path().join(".planning-config.json"), "{}").unwrap();

    let report = detect_recovery(&store);
    assert_eq!(report.mode, Some(RecoveryMode::MegaPlan));
}

#[test]
fn planning_config_outranks_prd() {
    let (dir, store) = store();
    store.write_plan(&Plan::new("goal")).unwrap();
    std::fs::write(dir.path().join(".planning-config.json"), "{}").unwrap();

    let report = detect_recovery(&store);
    assert_eq!(report.mode, Some(RecoveryMode::Worktree));
}
