// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::provider::{Completion, StopReason, ToolCall};
use crate::scripted::ScriptedProvider;
use crate::tools::{Tool, ToolError, ToolSchema};
use crate::LlmError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

struct Recorder {
    calls: Arc<Mutex<Vec<serde_json::Value>>>,
    response: Result<String, ToolError>,
}

#[async_trait]
impl Tool for Recorder {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "record".to_string(),
            description: "records arguments".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        self.calls.lock().push(arguments);
        self.response.clone()
    }
}

fn tool_use(content: &str, id: &str) -> Completion {
    Completion {
        content: content.to_string(),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: "record".to_string(),
            arguments: serde_json::json!({"n": 1}),
        }],
        stop_reason: StopReason::ToolUse,
        usage: None,
        model: String::new(),
    }
}

fn engine_with(
    responses: Vec<Result<Completion, LlmError>>,
    tool_response: Result<String, ToolError>,
) -> (ReactEngine, Arc<Mutex<Vec<serde_json::Value>>>, Arc<ScriptedProvider>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(Recorder {
        calls: calls.clone(),
        response: tool_response,
    }));
    let provider = Arc::new(ScriptedProvider::new(responses));
    let engine = ReactEngine::new(provider.clone(), tools, ReactConfig::default());
    (engine, calls, provider)
}

#[tokio::test]
async fn completion_marker_terminates_success() {
    let (engine, _calls, _provider) = engine_with(
        vec![
            Ok(tool_use("working on it", "call-1")),
            Ok(tool_use("still going", "call-2")),
            Ok(Completion::text("All done.\nTASK_COMPLETE\n")),
        ],
        Ok("ok".to_string()),
    );

    let outcome = engine.run("build the widget", None).await;
    assert!(outcome.success);
    assert_eq!(outcome.iterations, 3);
    assert!(outcome.output.contains("TASK_COMPLETE"));
    assert_eq!(outcome.tool_calls.len(), 2);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn failure_marker_extracts_reason() {
    let (engine, _calls, _provider) = engine_with(
        vec![Ok(Completion::text("TASK_FAILED: missing credentials\nmore text"))],
        Ok("ok".to_string()),
    );

    let outcome = engine.run("task", None).await;
    assert!(!outcome.success);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.error.as_deref(), Some("missing credentials"));
}

#[tokio::test]
async fn bare_failure_marker_gets_default_reason() {
    let (engine, _calls, _provider) = engine_with(
        vec![Ok(Completion::text("TASK_FAILED:"))],
        Ok("ok".to_string()),
    );

    let outcome = engine.run("task", None).await;
    assert_eq!(outcome.error.as_deref(), Some("Task failed"));
}

#[tokio::test]
async fn end_turn_without_tools_is_success() {
    let (engine, _calls, _provider) = engine_with(
        vec![Ok(Completion::text("that's everything"))],
        Ok("ok".to_string()),
    );

    let outcome = engine.run("task", None).await;
    assert!(outcome.success);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.final_response.as_deref(), Some("that's everything"));
}

#[tokio::test]
async fn tool_error_becomes_observation_and_loop_continues() {
    let (engine, calls, _provider) = engine_with(
        vec![
            Ok(tool_use("trying", "call-1")),
            Ok(Completion::text("TASK_COMPLETE")),
        ],
        Err(ToolError::Execution("disk full".to_string())),
    );

    let outcome = engine.run("task", None).await;
    assert!(outcome.success);
    assert_eq!(calls.lock().len(), 1);
    assert_eq!(outcome.tool_calls.len(), 1);
    assert!(outcome.tool_calls[0].is_error);
}

#[tokio::test]
async fn tool_results_are_truncated() {
    let big = "x".repeat(TOOL_RESULT_LIMIT * 4);
    let (engine, _calls, provider) = engine_with(
        vec![
            Ok(tool_use("reading", "call-1")),
            Ok(Completion::text("TASK_COMPLETE")),
        ],
        Ok(big),
    );

    let outcome = engine.run("task", None).await;
    assert!(outcome.success);

    // The tool-result message in the second request is capped.
    let requests = provider.requests();
    let second = &requests[1];
    let tool_msg = second
        .messages
        .iter()
        .find(|m| m.tool_call_id.is_some())
        .unwrap();
    assert_eq!(tool_msg.content.len(), TOOL_RESULT_LIMIT);
}

#[tokio::test]
async fn iteration_cap_is_a_failure() {
    let responses = (0..3)
        .map(|i| Ok(tool_use("looping", &format!("call-{i}"))))
        .collect();
    let (mut engine, _calls, _provider) = {
        let (e, c, p) = engine_with(responses, Ok("ok".to_string()));
        (e, c, p)
    };
    engine.config.max_iterations = 3;

    let outcome = engine.run("task", None).await;
    assert!(!outcome.success);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Maximum iterations reached without completion")
    );
}

#[tokio::test]
async fn provider_error_terminates_run() {
    let (engine, _calls, _provider) =
        engine_with(vec![Err(LlmError::RateLimit)], Ok("ok".to_string()));

    let outcome = engine.run("task", None).await;
    assert!(!outcome.success);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.error.as_deref(), Some("rate limited by provider"));
}

#[tokio::test]
async fn cancellation_stops_before_next_think() {
    let (engine, _calls, _provider) = engine_with(
        vec![Ok(Completion::text("unreachable"))],
        Ok("ok".to_string()),
    );
    engine.cancellation_token().cancel();

    let outcome = engine.run("task", None).await;
    assert!(!outcome.success);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.error.as_deref(), Some("Execution stopped by user"));
}

#[tokio::test]
async fn text_callback_receives_chunks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = seen.clone();
    let (engine, _calls, _provider) = engine_with(
        vec![Ok(Completion::text("final answer"))],
        Ok("ok".to_string()),
    );
    let engine = engine.on_text(Arc::new(move |text: &str| {
        seen_cb.lock().push(text.to_string());
    }));

    let outcome = engine.run("task", None).await;
    assert!(outcome.success);
    assert_eq!(seen.lock().as_slice(), &["final answer".to_string()]);
}
