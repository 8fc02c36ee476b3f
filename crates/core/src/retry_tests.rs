// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn failure(agent: &str, error_type: ErrorType) -> FailureRecord {
    FailureRecord {
        agent: agent.to_string(),
        error_type,
        error_excerpt: "boom".to_string(),
        timestamp: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[test]
fn record_increments_monotonically() {
    let mut state = RetryState::default();
    assert_eq!(state.record(failure("codex", ErrorType::Timeout)), 1);
    assert_eq!(state.record(failure("aider", ErrorType::QualityGate)), 2);
    assert_eq!(state.attempt_count, 2);
    assert_eq!(state.history.len(), 2);
    assert_eq!(state.last_agent.as_deref(), Some("aider"));
}

#[test]
fn error_type_serde_snake_case() {
    assert_eq!(
        serde_json::to_string(&ErrorType::QualityGate).unwrap(),
        "\"quality_gate\""
    );
    let parsed: ErrorType = serde_json::from_str("\"process_crash\"").unwrap();
    assert_eq!(parsed, ErrorType::ProcessCrash);
}

#[test]
fn error_type_display() {
    assert_eq!(ErrorType::Timeout.to_string(), "timeout");
    assert_eq!(ErrorType::ExitCode.to_string(), "exit_code");
    assert_eq!(ErrorType::Unknown.to_string(), "unknown");
}

#[test]
fn retry_state_round_trip() {
    let mut state = RetryState::default();
    state.record(failure("codex", ErrorType::ExitCode));
    let json = serde_json::to_string(&state).unwrap();
    let parsed: RetryState = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, state);
}
