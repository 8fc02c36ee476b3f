// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Think–Act–Observe loop driving a provider with tools.
//!
//! Each iteration asks the provider for a completion over the running
//! transcript, scans the text for completion/failure markers, executes
//! any requested tools, and feeds the results back. The loop is bounded
//! by `max_iterations` and an external cancellation token.

use crate::provider::{ChatMessage, CompletionRequest, Provider, StopReason};
use crate::tools::ToolRegistry;
use cascade_core::ToolCallRecord;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tool results are truncated to this many bytes before entering the
/// transcript, to protect the context window.
pub const TOOL_RESULT_LIMIT: usize = 2048;

/// Failure reasons extracted after a marker are capped at this length.
const FAILURE_REASON_LIMIT: usize = 200;

const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous coding agent. Complete the task using \
the available tools.\n\
When you complete the task successfully, output \"TASK_COMPLETE\" on its own line.\n\
If you encounter an unrecoverable error, output \"TASK_FAILED: <reason>\".";

/// Loop configuration.
#[derive(Debug, Clone)]
pub struct ReactConfig {
    pub max_iterations: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub completion_markers: Vec<String>,
    pub failure_markers: Vec<String>,
    pub stop_on_end_turn: bool,
    pub system_prompt: String,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            temperature: 0.7,
            max_tokens: 8192,
            completion_markers: vec![
                "TASK_COMPLETE".to_string(),
                "Task completed".to_string(),
                "Done.".to_string(),
            ],
            failure_markers: vec![
                "TASK_FAILED:".to_string(),
                "Cannot complete".to_string(),
                "Error:".to_string(),
            ],
            stop_on_end_turn: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ReactConfig {
    cascade_core::setters! {
        into {
            system_prompt: String,
        }
        set {
            max_iterations: u32,
            temperature: f32,
            max_tokens: u32,
            completion_markers: Vec<String>,
            failure_markers: Vec<String>,
            stop_on_end_turn: bool,
        }
    }
}

/// Final state of one ReAct run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactOutcome {
    pub success: bool,
    /// Concatenated assistant text across iterations.
    pub output: String,
    pub iterations: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    pub final_response: Option<String>,
    pub error: Option<String>,
}

/// Marker scan result.
enum MarkerHit {
    Complete,
    Failed(String),
}

/// The Think–Act–Observe engine.
pub struct ReactEngine {
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    config: ReactConfig,
    cancel: CancellationToken,
    on_text: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl ReactEngine {
    pub fn new(provider: Arc<dyn Provider>, tools: ToolRegistry, config: ReactConfig) -> Self {
        Self {
            provider,
            tools,
            config,
            cancel: CancellationToken::new(),
            on_text: None,
        }
    }

    /// Token observers can use to stop the loop between iterations.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register a callback receiving each assistant text chunk.
    pub fn on_text(mut self, callback: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        self.on_text = Some(callback);
        self
    }

    /// Run the loop for one task.
    ///
    /// Provider failures terminate the run with the error folded into the
    /// outcome; tool failures are observations, not terminations.
    pub async fn run(&self, task: &str, context: Option<&str>) -> ReactOutcome {
        let mut messages = vec![
            ChatMessage::system(self.config.system_prompt.clone()),
            ChatMessage::user(build_task_prompt(task, context)),
        ];
        let schemas = self.tools.schemas();

        let mut output = String::new();
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();

        for iteration in 0..self.config.max_iterations {
            if self.cancel.is_cancelled() {
                return ReactOutcome {
                    success: false,
                    output,
                    iterations: iteration,
                    tool_calls,
                    final_response: None,
                    error: Some("Execution stopped by user".to_string()),
                };
            }

            // THINK
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: schemas.clone(),
                tool_choice: None,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };
            let completion = match self.provider.complete(request).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "provider failed, terminating run");
                    return ReactOutcome {
                        success: false,
                        output,
                        iterations: iteration,
                        tool_calls,
                        final_response: None,
                        error: Some(e.to_string()),
                    };
                }
            };

            if !completion.content.is_empty() {
                output.push_str(&completion.content);
                output.push('\n');
                if let Some(cb) = &self.on_text {
                    cb(&completion.content);
                }

                if let Some(hit) = self.scan_markers(&completion.content) {
                    let (success, error) = match hit {
                        MarkerHit::Complete => (true, None),
                        MarkerHit::Failed(reason) => (false, Some(reason)),
                    };
                    return ReactOutcome {
                        success,
                        output,
                        iterations: iteration + 1,
                        tool_calls,
                        final_response: Some(completion.content),
                        error,
                    };
                }
            }

            // Natural end of turn without tool calls
            if self.config.stop_on_end_turn
                && completion.stop_reason == StopReason::EndTurn
                && completion.tool_calls.is_empty()
            {
                return ReactOutcome {
                    success: true,
                    output,
                    iterations: iteration + 1,
                    tool_calls,
                    final_response: Some(completion.content),
                    error: None,
                };
            }

            if completion.tool_calls.is_empty() {
                // Neither tool calls nor end_turn: unusual, stop without
                // marking failure.
                tracing::warn!(iteration, "no tool calls and no end_turn, stopping loop");
                return ReactOutcome {
                    success: true,
                    output,
                    iterations: iteration + 1,
                    tool_calls,
                    final_response: Some(completion.content),
                    error: None,
                };
            }

            // ACT
            messages.push(ChatMessage {
                role: crate::provider::Role::Assistant,
                content: completion.content.clone(),
                tool_calls: completion.tool_calls.clone(),
                tool_call_id: None,
            });

            for call in &completion.tool_calls {
                let (body, is_error) =
                    match self.tools.execute(&call.name, call.arguments.clone()).await {
                        Ok(result) => (result, false),
                        Err(e) => (format!("Error: {e}"), true),
                    };
                tool_calls.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    is_error,
                });

                // OBSERVE
                messages.push(ChatMessage::tool_result(
                    call.id.clone(),
                    truncate(&body, TOOL_RESULT_LIMIT),
                ));
            }
        }

        ReactOutcome {
            success: false,
            output,
            iterations: self.config.max_iterations,
            tool_calls,
            final_response: None,
            error: Some("Maximum iterations reached without completion".to_string()),
        }
    }

    fn scan_markers(&self, content: &str) -> Option<MarkerHit> {
        for marker in &self.config.completion_markers {
            if content.contains(marker.as_str()) {
                return Some(MarkerHit::Complete);
            }
        }
        for marker in &self.config.failure_markers {
            if let Some(idx) = content.find(marker.as_str()) {
                let after = content[idx + marker.len()..].trim();
                let reason = after.lines().next().unwrap_or("");
                let reason = truncate(reason, FAILURE_REASON_LIMIT);
                return Some(MarkerHit::Failed(if reason.is_empty() {
                    "Task failed".to_string()
                } else {
                    reason
                }));
            }
        }
        None
    }
}

fn build_task_prompt(task: &str, context: Option<&str>) -> String {
    let mut prompt = format!("## Task\n{task}");
    if let Some(ctx) = context {
        if !ctx.is_empty() {
            prompt.push_str("\n\n## Context\n");
            prompt.push_str(ctx);
        }
    }
    prompt.push_str("\n\nPlease complete this task. Use the available tools as needed.");
    prompt
}

/// Truncate on a char boundary at or below `limit` bytes.
fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
#[path = "react_tests.rs"]
mod tests;
