// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S6 — ReAct completion marker: a scripted provider emits
//! `TASK_COMPLETE` on its third turn and the loop terminates with
//! success after exactly three iterations.

use cascade_llm::{
    Completion, ReactConfig, ReactEngine, ScriptedProvider, StopReason, ToolCall, ToolError,
    ToolRegistry, ToolSchema,
};
use async_trait::async_trait;
use std::sync::Arc;

struct NoopTool;

#[async_trait]
impl cascade_llm::Tool for NoopTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "noop".to_string(),
            description: "does nothing".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    async fn invoke(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        Ok("ok".to_string())
    }
}

fn tool_turn(content: &str, id: &str) -> Completion {
    Completion {
        content: content.to_string(),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: "noop".to_string(),
            arguments: serde_json::json!({}),
        }],
        stop_reason: StopReason::ToolUse,
        usage: None,
        model: String::new(),
    }
}

#[tokio::test]
async fn completion_marker_on_third_iteration() {
    let provider = Arc::new(ScriptedProvider::completions(vec![
        tool_turn("looking around", "call-1"),
        tool_turn("making the change", "call-2"),
        Completion::text("All criteria satisfied.\nTASK_COMPLETE\n"),
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(NoopTool));
    let engine = ReactEngine::new(provider, tools, ReactConfig::default());

    let outcome = engine.run("implement the story", None).await;
    assert!(outcome.success);
    assert_eq!(outcome.iterations, 3);
    assert!(outcome.output.contains("TASK_COMPLETE"));
    assert_eq!(outcome.tool_calls.len(), 2);
    assert!(outcome.error.is_none());
}
