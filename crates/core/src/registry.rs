// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry rows and the durable result record.
//!
//! The registry mirrors `.agent-status.json`: three buckets of rows
//! (`running`, `completed`, `failed`) plus an update stamp. Rows move
//! between buckets only through the promotion helpers here, which the
//! supervisor calls inside a single locked read-modify-write — a story
//! transitions out of `running` exactly once.

use crate::story::StoryId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A running agent row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub story_id: StoryId,
    pub agent: String,
    /// UTC ISO-8601 launch stamp.
    pub started_at: String,
    /// OS process id; absent for in-process (task-tool) backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_log_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
}

/// A row promoted out of `running` on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedEntry {
    pub story_id: StoryId,
    pub agent: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub completed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_log_path: Option<PathBuf>,
}

/// A row promoted out of `running` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub story_id: StoryId,
    pub agent: String,
    pub started_at: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub failed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_log_path: Option<PathBuf>,
}

/// The `.agent-status.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistry {
    #[serde(default)]
    pub running: Vec<AgentEntry>,
    #[serde(default)]
    pub completed: Vec<CompletedEntry>,
    #[serde(default)]
    pub failed: Vec<FailedEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl AgentRegistry {
    /// Find the running row for a story.
    pub fn running_entry(&self, story_id: &str) -> Option<&AgentEntry> {
        self.running.iter().find(|e| e.story_id == story_id)
    }

    /// True if the story has already reached a terminal bucket.
    pub fn is_terminal(&self, story_id: &str) -> bool {
        self.completed.iter().any(|e| e.story_id == story_id)
            || self.failed.iter().any(|e| e.story_id == story_id)
    }

    /// Add a running row. Replaces any previous running row for the same
    /// story (a relaunch supersedes the old attempt).
    pub fn insert_running(&mut self, entry: AgentEntry) {
        self.running.retain(|e| e.story_id != entry.story_id);
        self.running.push(entry);
    }

    /// Promote a running row to `completed`. No-op (returns None) if the
    /// story is not in `running`.
    pub fn promote_completed(
        &mut self,
        story_id: &str,
        exit_code: Option<i32>,
        completed_at: String,
    ) -> Option<CompletedEntry> {
        let idx = self.running.iter().position(|e| e.story_id == story_id)?;
        let entry = self.running.remove(idx);
        let row = CompletedEntry {
            story_id: entry.story_id,
            agent: entry.agent,
            started_at: entry.started_at,
            exit_code,
            completed_at,
            output_log_path: entry.output_log_path,
        };
        self.completed.push(row.clone());
        Some(row)
    }

    /// Promote a running row to `failed`. No-op (returns None) if the
    /// story is not in `running`.
    pub fn promote_failed(
        &mut self,
        story_id: &str,
        error: impl Into<String>,
        exit_code: Option<i32>,
        failed_at: String,
    ) -> Option<FailedEntry> {
        let idx = self.running.iter().position(|e| e.story_id == story_id)?;
        let entry = self.running.remove(idx);
        let row = FailedEntry {
            story_id: entry.story_id,
            agent: entry.agent,
            started_at: entry.started_at,
            error: error.into(),
            exit_code,
            failed_at,
            output_log_path: entry.output_log_path,
        };
        self.failed.push(row.clone());
        Some(row)
    }

    /// Drop terminal rows older than the cutoff stamp. Running rows are
    /// never pruned.
    pub fn prune_terminal_before(&mut self, cutoff: &str) -> usize {
        let before = self.completed.len() + self.failed.len();
        self.completed.retain(|e| e.completed_at.as_str() >= cutoff);
        self.failed.retain(|e| e.failed_at.as_str() >= cutoff);
        before - (self.completed.len() + self.failed.len())
    }
}

/// The durable per-story result, written once by the launched process
/// (or by the supervisor when it reaps an orphan) to
/// `.agent-outputs/<story>.result.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub story_id: StoryId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
