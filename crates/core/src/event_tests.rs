// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn story_events_expose_story_id() {
    let event = EngineEvent::StoryStarted {
        story_id: StoryId::new("story-001"),
        agent: "codex".to_string(),
    };
    assert_eq!(event.story_id().map(StoryId::as_str), Some("story-001"));
}

#[test]
fn batch_events_have_no_story() {
    assert!(EngineEvent::BatchStarted { index: 0, size: 3 }.story_id().is_none());
    assert!(EngineEvent::BatchCompleted { index: 0 }.story_id().is_none());
}

#[test]
fn events_tag_serialization() {
    let event = EngineEvent::GateResult {
        story_id: StoryId::new("story-001"),
        gate: "tests".to_string(),
        passed: false,
        required: true,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "gate_result");
    assert_eq!(json["gate"], "tests");
}
