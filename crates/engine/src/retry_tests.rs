// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cascade_core::FakeClock;
use yare::parameterized;

fn manager() -> RetryManager<FakeClock> {
    RetryManager::new(FakeClock::new())
}

#[test]
fn fresh_story_can_retry() {
    let m = manager();
    assert!(m.can_retry("story-001"));
    assert!(!m.is_abandoned("story-001"));
    assert_eq!(m.attempt_count("story-001"), 0);
}

#[test]
fn counter_grows_monotonically() {
    let mut m = manager();
    let id = StoryId::new("story-001");
    assert_eq!(m.record_failure(&id, "codex", ErrorType::Timeout, "slow"), 1);
    assert_eq!(
        m.record_failure(&id, "aider", ErrorType::QualityGate, "tests"),
        2
    );
    assert_eq!(m.attempt_count("story-001"), 2);
    assert_eq!(m.last_agent("story-001"), Some("aider"));
}

#[test]
fn abandoned_after_exceeding_max_attempts() {
    let mut m = manager();
    let id = StoryId::new("story-001");
    m.record_failure(&id, "codex", ErrorType::ExitCode, "1");
    m.record_failure(&id, "codex", ErrorType::ExitCode, "1");
    assert!(m.can_retry("story-001"));

    m.record_failure(&id, "codex", ErrorType::ExitCode, "1");
    assert!(!m.can_retry("story-001"));
    assert!(m.is_abandoned("story-001"));
}

#[test]
fn custom_max_attempts() {
    let mut m = RetryManager::new(FakeClock::new()).with_max_attempts(0);
    let id = StoryId::new("story-001");
    m.record_failure(&id, "codex", ErrorType::Unknown, "x");
    assert!(!m.can_retry("story-001"));
}

#[test]
fn history_preserves_every_failure() {
    let mut m = manager();
    let id = StoryId::new("story-001");
    m.record_failure(&id, "codex", ErrorType::Timeout, "first");
    m.record_failure(&id, "aider", ErrorType::ProcessCrash, "second");

    let state = m.state("story-001").unwrap();
    assert_eq!(state.history.len(), 2);
    assert_eq!(state.history[0].error_excerpt, "first");
    assert_eq!(state.history[1].error_type, ErrorType::ProcessCrash);
}

#[parameterized(
    timeout = { "Timeout after 2 s", ErrorType::Timeout },
    exit_code = { "Exit code 3", ErrorType::ExitCode },
    crash = { "Process exited unexpectedly", ErrorType::ProcessCrash },
    gate = { "quality gate(s): tests", ErrorType::QualityGate },
    unknown = { "something odd", ErrorType::Unknown },
)]
fn classifies_supervisor_errors(error: &str, expected: ErrorType) {
    assert_eq!(RetryManager::<FakeClock>::classify_error(error), expected);
}
