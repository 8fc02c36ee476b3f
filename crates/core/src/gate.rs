// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quality-gate configuration and per-gate output.

use serde::{Deserialize, Serialize};

/// Default per-gate command timeout.
pub const DEFAULT_GATE_TIMEOUT_SECS: u64 = 300;

/// Kind of verification a gate performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateType {
    Typecheck,
    Test,
    Lint,
    Custom,
}

crate::simple_display! {
    GateType {
        Typecheck => "typecheck",
        Test => "test",
        Lint => "lint",
        Custom => "custom",
    }
}

/// Configuration for one gate.
///
/// `command: None` means "use the default command for the detected
/// project type"; custom gates must carry a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub gate_type: GateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_gate_timeout")]
    pub timeout_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_gate_timeout() -> u64 {
    DEFAULT_GATE_TIMEOUT_SECS
}

impl GateConfig {
    pub fn new(name: impl Into<String>, gate_type: GateType) -> Self {
        Self {
            name: name.into(),
            gate_type,
            command: None,
            required: true,
            enabled: true,
            timeout_seconds: DEFAULT_GATE_TIMEOUT_SECS,
        }
    }

    crate::setters! {
        into {
            name: String,
        }
        set {
            required: bool,
            enabled: bool,
            timeout_seconds: u64,
        }
        option {
            command: String,
        }
    }
}

/// Result of one gate execution. Transient; aggregated per story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutput {
    pub name: String,
    #[serde(rename = "type")]
    pub gate_type: GateType,
    pub required: bool,
    pub passed: bool,
    pub exit_code: i32,
    #[serde(default)]
    pub stdout_excerpt: String,
    #[serde(default)]
    pub stderr_excerpt: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
