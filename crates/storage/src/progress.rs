// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only progress log.
//!
//! One line per event: `[YYYY-MM-DD HH:MM:SS] story_id: message`.
//! Appends are best-effort — a full disk must not take down the engine —
//! and readers parse but never rewrite.

use cascade_core::{time_fmt, Clock, StoryId};
use regex::Regex;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Regex for one progress line: `[YYYY-MM-DD HH:MM:SS] story_id: message`.
#[allow(clippy::expect_used)]
static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<ts>[0-9\- :]{19})\]\s+(?P<id>[A-Za-z0-9_\-]+):\s+(?P<msg>.*)$")
        .expect("constant regex pattern is valid")
});

/// Status token recognized at the start of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressToken {
    Complete,
    Failed,
    Fallback,
    Retry,
}

impl ProgressToken {
    fn parse(message: &str) -> Option<Self> {
        if message.starts_with("[COMPLETE]") {
            Some(ProgressToken::Complete)
        } else if message.starts_with("[FAILED]") {
            Some(ProgressToken::Failed)
        } else if message.starts_with("[FALLBACK]") {
            Some(ProgressToken::Fallback)
        } else if message.starts_with("[RETRY]") {
            Some(ProgressToken::Retry)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressToken::Complete => "[COMPLETE]",
            ProgressToken::Failed => "[FAILED]",
            ProgressToken::Fallback => "[FALLBACK]",
            ProgressToken::Retry => "[RETRY]",
        }
    }
}

/// One parsed progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEntry {
    pub timestamp: String,
    pub story_id: StoryId,
    pub message: String,
    pub token: Option<ProgressToken>,
}

/// Reader/writer for `progress.txt`.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one line. Failures are logged at warn and swallowed.
    pub fn append(&self, clock: &impl Clock, story_id: &str, message: &str) {
        let line = format!(
            "[{}] {}: {}\n",
            time_fmt::format_local(clock.epoch_ms()),
            story_id,
            message
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            tracing::warn!(story_id, error = %e, "failed to append progress");
        }
    }

    /// Parse every well-formed line. Malformed lines are skipped.
    pub fn read(&self) -> Vec<ProgressEntry> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        content
            .lines()
            .filter_map(|line| {
                let caps = LINE_PATTERN.captures(line)?;
                let message = caps["msg"].to_string();
                Some(ProgressEntry {
                    timestamp: caps["ts"].to_string(),
                    story_id: StoryId::new(&caps["id"]),
                    token: ProgressToken::parse(&message),
                    message,
                })
            })
            .collect()
    }

    /// Ids of stories with a `[COMPLETE]` line.
    pub fn completed_ids(&self) -> HashSet<StoryId> {
        self.read()
            .into_iter()
            .filter(|e| e.token == Some(ProgressToken::Complete))
            .map(|e| e.story_id)
            .collect()
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
