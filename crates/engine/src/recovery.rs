// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cold-start recovery detection.
//!
//! A fresh process inspects the project's durable files to determine
//! which execution mode was active and whether in-flight work remains.

use cascade_core::{Clock, StoryStatus};
use cascade_storage::StateStore;
use serde::{Deserialize, Serialize};

/// Active execution mode, by file priority:
/// `mega-plan.json` > `.planning-config.json` > `prd.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    MegaPlan,
    Worktree,
    Prd,
}

/// What a fresh process should do about prior state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RecoveryMode>,
    pub recovery_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_action: Option<String>,
    pub in_progress: Vec<String>,
    pub pending: usize,
}

/// Inspect durable state and report the resume posture.
pub fn detect_recovery<C: Clock>(store: &StateStore<C>) -> RecoveryReport {
    let paths = store.paths();

    let mode = if paths.mega_plan().is_file() {
        Some(RecoveryMode::MegaPlan)
    } else if paths.planning_config().is_file() {
        Some(RecoveryMode::Worktree)
    } else if paths.plan().is_file() {
        Some(RecoveryMode::Prd)
    } else {
        None
    };

    let mut in_progress = Vec::new();
    let mut pending = 0usize;
    if let Some(plan) = store.read_plan() {
        for story in &plan.stories {
            match story.status {
                StoryStatus::InProgress => in_progress.push(story.id.to_string()),
                StoryStatus::Pending => pending += 1,
                _ => {}
            }
        }
    }

    let has_checkpoint = paths.execution_context().is_file();
    let recovery_needed =
        mode.is_some() && (has_checkpoint || !in_progress.is_empty() || pending > 0);

    let resume_action = recovery_needed.then(|| {
        match mode {
            Some(RecoveryMode::MegaPlan) => "resume mega-plan execution",
            Some(RecoveryMode::Worktree) => "resume worktree execution",
            _ => "resume prd execution",
        }
        .to_string()
    });

    RecoveryReport {
        mode,
        recovery_needed,
        resume_action,
        in_progress,
        pending,
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
