// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration as stored in `agents.json`.
//!
//! The configuration surface is a closed enumeration: an agent is either
//! an external CLI (spawned subprocess) or a task-tool (in-process
//! backend); there is no open-ended key space.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default per-agent execution timeout.
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 600;

/// How an agent is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    /// External CLI spawned as a detached subprocess.
    #[default]
    Cli,
    /// In-process backend (no OS pid to track).
    TaskTool,
}

crate::simple_display! {
    AgentKind {
        Cli => "cli",
        TaskTool => "task-tool",
    }
}

/// One agent definition from `agents.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDef {
    #[serde(rename = "type", default)]
    pub kind: AgentKind,
    #[serde(default)]
    pub command: String,
    /// Argument template; placeholders `{prompt}`, `{story_id}`, and
    /// `{working_dir}` are expanded at launch.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default = "default_agent_timeout", rename = "timeout")]
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subagent_type: Option<String>,
}

fn default_agent_timeout() -> u64 {
    DEFAULT_AGENT_TIMEOUT_SECS
}

/// Per-phase selection defaults from the `phase_defaults` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseDefaults {
    pub default_agent: String,
    #[serde(default)]
    pub fallback_chain: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub story_type_overrides: IndexMap<String, String>,
}

/// The `agents.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,
    #[serde(default)]
    pub agents: IndexMap<String, AgentDef>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub phase_defaults: IndexMap<String, PhaseDefaults>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub story_type_defaults: IndexMap<String, String>,
}

impl AgentsConfig {
    /// Look up an agent definition by name.
    pub fn get(&self, name: &str) -> Option<&AgentDef> {
        self.agents.get(name)
    }
}

#[cfg(test)]
#[path = "agent_config_tests.rs"]
mod tests;
