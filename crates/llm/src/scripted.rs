// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted provider for tests: returns queued completions in order.

use crate::provider::{Completion, CompletionRequest, Provider};
use crate::LlmError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A provider that replays a fixed script of responses.
///
/// Once the script is exhausted, further calls return the configured
/// fallback error (default: `Generic("script exhausted")`).
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Result<Completion, LlmError>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<Completion, LlmError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: a script of successful completions.
    pub fn completions(completions: Vec<Completion>) -> Self {
        Self::new(completions.into_iter().map(Ok).collect())
    }

    /// Number of completions consumed so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests captured so far (cloned).
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Generic("script exhausted".to_string())))
    }
}
