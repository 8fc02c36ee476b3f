// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cascade-llm: the LLM provider contract, tool registry, and ReAct engine.
//!
//! Provider adapters (wire formats, auth) live outside this workspace;
//! the engine only consumes the [`Provider`] trait defined here.

pub mod provider;
pub mod react;
pub mod tools;

#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

pub use provider::{
    ChatMessage, Completion, CompletionRequest, Provider, Role, StopReason, ToolCall, Usage,
};
pub use react::{ReactConfig, ReactEngine, ReactOutcome};
pub use tools::{Tool, ToolError, ToolRegistry, ToolSchema};

#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedProvider;

use thiserror::Error;

/// Typed provider failures. Callers pattern-match instead of inspecting
/// exception strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("rate limited by provider")]
    RateLimit,
    #[error("authentication failed")]
    Authentication,
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("{0}")]
    Generic(String),
}
