// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-story retry state: a monotonic failure counter with history.

use serde::{Deserialize, Serialize};

/// Categorized failure cause for a story attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Timeout,
    ExitCode,
    QualityGate,
    ProcessCrash,
    Unknown,
}

crate::simple_display! {
    ErrorType {
        Timeout => "timeout",
        ExitCode => "exit_code",
        QualityGate => "quality_gate",
        ProcessCrash => "process_crash",
        Unknown => "unknown",
    }
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub agent: String,
    pub error_type: ErrorType,
    pub error_excerpt: String,
    /// UTC ISO-8601 stamp.
    pub timestamp: String,
}

/// Retry bookkeeping for one story. `attempt_count` and `history` only
/// ever grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryState {
    pub attempt_count: u32,
    #[serde(default)]
    pub history: Vec<FailureRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_agent: Option<String>,
}

impl RetryState {
    /// Record a failure and return the new attempt count.
    pub fn record(&mut self, record: FailureRecord) -> u32 {
        self.attempt_count += 1;
        self.last_agent = Some(record.agent.clone());
        self.history.push(record);
        self.attempt_count
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
