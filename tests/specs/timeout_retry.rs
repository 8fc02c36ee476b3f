// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S2 — timeout and retry with agent escalation: a sleeping agent is
//! killed at its deadline, the failure is recorded, and the retry chain
//! proposes the next agent.

use crate::prelude::*;
use cascade_backends::{Availability, PhaseAgentManager};
use cascade_core::{AgentDef, AgentKind, AgentsConfig, ErrorType, StoryId};
use cascade_engine::{RetryManager, Supervisor};
use std::time::Duration;

struct OnlyAider;

impl Availability for OnlyAider {
    fn is_available(&self, agent: &str) -> bool {
        agent == "aider"
    }
}

#[tokio::test]
async fn timeout_kills_agent_and_escalates() {
    let (_dir, store) = project();
    let supervisor = Supervisor::new(store.clone());

    let def = AgentDef {
        kind: AgentKind::Cli,
        command: "sh".to_string(),
        args: vec!["-c".to_string(), "sleep 10".to_string()],
        timeout_seconds: 1,
        ..AgentDef::default()
    };
    let story = story("story-001", &[]);
    supervisor.launch_cli(&story, "codex", &def).await.unwrap();

    // The poll loop reconciles until the deadline kills the agent.
    let settled = supervisor
        .wait_for(None, Duration::from_secs(15), Duration::from_millis(100))
        .await
        .unwrap();
    assert!(settled);

    let reg = store.read_registry();
    assert!(reg.running.is_empty());
    assert_eq!(reg.failed.len(), 1);
    assert_eq!(reg.failed[0].error, "Timeout after 1 s");
    assert_eq!(reg.failed[0].agent, "codex");

    // Retry bookkeeping and escalation to the next agent in the chain
    let mut retry = RetryManager::new(store.clock().clone());
    let attempt = retry.record_failure(
        &StoryId::new("story-001"),
        "codex",
        ErrorType::Timeout,
        &reg.failed[0].error,
    );
    assert_eq!(attempt, 1);
    assert!(retry.can_retry("story-001"));

    let manager = PhaseAgentManager::new(&AgentsConfig::default(), &OnlyAider);
    assert_eq!(manager.retry_agent("codex"), "claude-code");
    // When the failing agent was the retry default itself, the chain
    // moves on to aider.
    assert_eq!(manager.retry_agent("claude-code"), "aider");
}
