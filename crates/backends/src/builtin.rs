// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in backend: the in-process ReAct loop over an LLM provider.

use crate::{Backend, BackendError, ExecutionContext};
use async_trait::async_trait;
use cascade_core::{ExecutionResult, Story};
use cascade_llm::{Provider, ReactConfig, ReactEngine, ReactOutcome, ToolRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const BUILTIN_AGENT_NAME: &str = "builtin";

pub struct BuiltinBackend {
    engine: ReactEngine,
    cancel: CancellationToken,
}

impl BuiltinBackend {
    pub fn new(provider: Arc<dyn Provider>, tools: ToolRegistry, config: ReactConfig) -> Self {
        let engine = ReactEngine::new(provider, tools, config);
        let cancel = engine.cancellation_token();
        Self { engine, cancel }
    }
}

#[async_trait]
impl Backend for BuiltinBackend {
    fn name(&self) -> &str {
        BUILTIN_AGENT_NAME
    }

    async fn execute(&self, story: &Story, ctx: &ExecutionContext) -> ExecutionResult {
        let prompt = match &ctx.prompt {
            Some(p) => p.clone(),
            None => crate::prompt::build_story_prompt(story),
        };
        let context = format!("Working directory: {}", ctx.working_dir.display());

        let outcome: ReactOutcome = self.engine.run(&prompt, Some(&context)).await;

        ExecutionResult {
            success: outcome.success,
            output: outcome.output,
            iterations: outcome.iterations,
            error: outcome.error,
            story_id: Some(story.id.clone()),
            agent: BUILTIN_AGENT_NAME.to_string(),
            tool_calls: outcome.tool_calls,
            metadata: serde_json::Map::new(),
        }
    }

    async fn stop(&self) -> Result<(), BackendError> {
        self.cancel.cancel();
        Ok(())
    }
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
