// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine events emitted by the iteration loop.
//!
//! Components observe execution by subscribing to these events instead of
//! holding references back into the orchestrator.

use crate::story::StoryId;
use serde::{Deserialize, Serialize};

/// An observable fact about execution progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    BatchStarted {
        index: usize,
        size: usize,
    },
    BatchCompleted {
        index: usize,
    },
    StoryStarted {
        story_id: StoryId,
        agent: String,
    },
    StoryFinished {
        story_id: StoryId,
        success: bool,
    },
    GateResult {
        story_id: StoryId,
        gate: String,
        passed: bool,
        required: bool,
    },
    RetryDecided {
        story_id: StoryId,
        agent: String,
        attempt: u32,
    },
}

impl EngineEvent {
    /// Story this event concerns, if any.
    pub fn story_id(&self) -> Option<&StoryId> {
        match self {
            EngineEvent::StoryStarted { story_id, .. }
            | EngineEvent::StoryFinished { story_id, .. }
            | EngineEvent::GateResult { story_id, .. }
            | EngineEvent::RetryDecided { story_id, .. } => Some(story_id),
            EngineEvent::BatchStarted { .. } | EngineEvent::BatchCompleted { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
