// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform backend result contract.

use crate::story::StoryId;
use serde::{Deserialize, Serialize};

/// One tool invocation made during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

/// Standardized result returned by every backend's `execute`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    /// Number of ReAct cycles; zero for subprocess backends.
    #[serde(default)]
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_id: Option<StoryId>,
    #[serde(default)]
    pub agent: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionResult {
    /// Build a failure result with an error message.
    pub fn failure(agent: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            agent: agent.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Build a success result with output text.
    pub fn success(agent: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: true,
            agent: agent.into(),
            output: output.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
