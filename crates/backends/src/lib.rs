// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cascade-backends: executors that turn a story into an execution result.
//!
//! Three backend families share one capability surface:
//! - [`external::ExternalCliBackend`] — a configured CLI spawned as a
//!   detached subprocess, tracked through log and result files
//! - [`stream::StreamingCliBackend`] — a coding CLI in print mode whose
//!   line-delimited JSON event stream is demultiplexed to callbacks
//! - [`builtin::BuiltinBackend`] — the in-process ReAct loop
//!
//! Agent selection (phase chain + availability detection) also lives
//! here because it decides which backend gets a story.

pub mod builtin;
pub mod detect;
pub mod external;
pub mod phases;
pub mod prompt;
pub mod stream;

pub use builtin::BuiltinBackend;
pub use detect::{AgentInfo, DetectionSource, Detector};
pub use external::ExternalCliBackend;
pub use phases::{
    AgentOverrides, Availability, PhaseAgentManager, SelectedAgent, ALWAYS_AVAILABLE_AGENT,
};
pub use prompt::build_story_prompt;
pub use stream::{StreamCallbacks, StreamingCliBackend};

use async_trait::async_trait;
use cascade_core::{ExecutionResult, Story};
use std::path::PathBuf;
use thiserror::Error;

/// Backend failures that occur outside a completed execution (spawn,
/// template, stop). Failures *of* an execution are reported inside
/// [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("agent has no process to stop")]
    NoProcess,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Context handed to a backend for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Directory the agent works in.
    pub working_dir: PathBuf,
    /// Pre-built prompt; when absent the backend builds one from the story.
    pub prompt: Option<String>,
}

impl ExecutionContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Uniform backend capability surface.
///
/// The supervisor and orchestrator hold `Arc<dyn Backend>`; concrete
/// types never cross that seam.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Execute a story to completion and report the result.
    async fn execute(&self, story: &Story, ctx: &ExecutionContext) -> ExecutionResult;

    /// Stop an in-flight execution.
    async fn stop(&self) -> Result<(), BackendError>;

    /// Prepare a session before the first execution. Default: no-op.
    async fn start_session(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
