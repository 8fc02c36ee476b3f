// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cascade-engine: the execution engine.
//!
//! The orchestrator drains a plan batch by batch: the scheduler computes
//! the next ready set, the supervisor launches and reconciles agent
//! executions against on-disk state, the gate runner verifies completed
//! stories, and the retry manager decides relaunches with agent
//! escalation. Everything durable flows through `cascade-storage`.

pub mod gates;
pub mod orchestrator;
pub mod recovery;
pub mod retry;
pub mod scheduler;
pub mod strategy;
pub mod supervisor;

pub use gates::{
    detect_project_type, detect_venv, should_allow_progression, GateRunner, ProjectType,
};
pub use orchestrator::{
    BackendFactory, ControlHandle, Orchestrator, OrchestratorConfig, RunMode, RunOutcome,
};
pub use recovery::{detect_recovery, RecoveryMode, RecoveryReport};
pub use retry::RetryManager;
pub use scheduler::{batches, dependents_of, next_ready, BatchPlan};
pub use strategy::{ExecutionStrategy, StrategyAnalyzer, StrategyDecision};
pub use supervisor::{ReconcileReport, StatusSummary, Supervisor};

use cascade_core::PlanError;
use thiserror::Error;

/// Engine-level failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no plan found")]
    PlanMissing,
    #[error("plan is invalid: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    InvalidPlan(Vec<PlanError>),
    #[error("story not found: {0}")]
    StoryNotFound(String),
    #[error("agent not configured: {0}")]
    AgentNotFound(String),
    #[error("agent for story {0} has no process to stop")]
    NoProcess(String),
    #[error(transparent)]
    Storage(#[from] cascade_storage::StorageError),
    #[error(transparent)]
    Backend(#[from] cascade_backends::BackendError),
    #[error(transparent)]
    Llm(#[from] cascade_llm::LlmError),
}
