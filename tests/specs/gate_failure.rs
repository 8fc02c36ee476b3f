// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3 — a required quality-gate failure blocks progression and feeds
//! the retry manager; the advisory gate does not.

use crate::prelude::*;
use cascade_backends::AgentOverrides;
use cascade_core::{EngineEvent, ErrorType, GateConfig, GateType};
use cascade_engine::{Orchestrator, OrchestratorConfig, RunMode, RunOutcome};
use std::time::Duration;

#[tokio::test]
async fn required_gate_failure_blocks_progression() {
    let (_dir, store) = project();
    store
        .write_plan(&plan_with(vec![story("story-001", &[])]))
        .unwrap();
    write_stub_agent(&store, "echo implemented", 60);

    let config = OrchestratorConfig {
        poll_interval: Duration::from_millis(25),
        overrides: AgentOverrides {
            global_agent: Some("stub".to_string()),
            no_fallback: true,
            ..AgentOverrides::default()
        },
        gates: vec![
            GateConfig::new("tests", GateType::Custom)
                .command("exit 1")
                .required(true),
            GateConfig::new("lint", GateType::Custom)
                .command("exit 0")
                .required(false),
        ],
        ..OrchestratorConfig::default()
    };
    let mut orch = Orchestrator::new(store.clone(), config);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    orch.set_event_sink(tx);

    let outcome = orch.run(RunMode::UntilComplete).await.unwrap();
    assert_eq!(outcome, RunOutcome::Complete);

    // The story went in_progress → failed, never complete
    let plan = store.read_plan().unwrap();
    assert_eq!(plan.get("story-001").unwrap().status, StoryStatus::Failed);

    // Retry was recorded with the quality-gate error type
    let state = orch.retry_manager().state("story-001").unwrap();
    assert!(state.attempt_count >= 1);
    assert_eq!(state.history[0].error_type, ErrorType::QualityGate);

    // Gate events carried the required/advisory split
    let mut gate_events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::GateResult {
            gate,
            passed,
            required,
            ..
        } = event
        {
            gate_events.push((gate, passed, required));
        }
    }
    assert!(gate_events.contains(&("tests".to_string(), false, true)));
    assert!(gate_events.contains(&("lint".to_string(), true, false)));

    // A relaunch was issued while retries remained
    let progress = store.progress().read();
    assert!(progress.iter().any(|e| e.message.starts_with("[RETRY]")));
}
