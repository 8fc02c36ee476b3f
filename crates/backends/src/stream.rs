// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming CLI backend.
//!
//! Drives a locally installed coding CLI in print mode and demultiplexes
//! its line-delimited JSON event stream. Lines can carry multi-megabyte
//! tool outputs, so the reader uses a 10 MiB buffer. Events fan out to
//! optional callbacks; the final `result` event and the exit code fold
//! into the [`ExecutionResult`].

use crate::{Backend, BackendError, ExecutionContext};
use async_trait::async_trait;
use cascade_core::{ExecutionResult, Story, ToolCallRecord};
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Line buffer for the JSON event stream; default pipe buffers are too
/// small for large tool outputs.
pub const STREAM_BUFFER_BYTES: usize = 10 * 1024 * 1024;

type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;
type ToolCallback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Observer hooks for the event stream.
#[derive(Clone, Default)]
pub struct StreamCallbacks {
    pub on_text: Option<TextCallback>,
    pub on_thinking: Option<TextCallback>,
    pub on_tool_call: Option<ToolCallback>,
}

impl StreamCallbacks {
    fn emit_text(&self, text: &str) {
        if let Some(cb) = &self.on_text {
            cb(text);
        }
    }

    fn emit_thinking(&self, text: &str) {
        if let Some(cb) = &self.on_thinking {
            cb(text);
        }
    }

    fn emit_tool_call(&self, value: &serde_json::Value) {
        if let Some(cb) = &self.on_tool_call {
            cb(value);
        }
    }
}

/// Accumulated stream state for one execution.
#[derive(Default)]
struct StreamState {
    output_lines: Vec<String>,
    tool_calls: Vec<ToolCallRecord>,
    session_id: Option<String>,
    final_result: Option<String>,
}

pub struct StreamingCliBackend {
    agent_name: String,
    command: String,
    base_args: Vec<String>,
    callbacks: StreamCallbacks,
    session_id: Mutex<Option<String>>,
    current: Mutex<Option<Child>>,
}

impl StreamingCliBackend {
    pub fn new(agent_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            command: command.into(),
            base_args: vec![
                "--print".to_string(),
                "--output-format".to_string(),
                "stream-json".to_string(),
                "--verbose".to_string(),
                "--include-partial-messages".to_string(),
            ],
            callbacks: StreamCallbacks::default(),
            session_id: Mutex::new(None),
            current: Mutex::new(None),
        }
    }

    pub fn with_callbacks(mut self, callbacks: StreamCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Session id captured from the stream, for REPL continuity.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    /// Route one decoded event into the stream state and callbacks.
    fn handle_event(&self, data: &serde_json::Value, state: &mut StreamState) {
        match data.get("type").and_then(|t| t.as_str()).unwrap_or("") {
            "stream_event" => {
                let delta = &data["event"]["delta"];
                match delta.get("type").and_then(|t| t.as_str()).unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta.get("text").and_then(|t| t.as_str()) {
                            self.callbacks.emit_text(text);
                        }
                    }
                    "thinking_delta" => {
                        if let Some(text) = delta.get("thinking").and_then(|t| t.as_str()) {
                            self.callbacks.emit_thinking(text);
                        }
                    }
                    _ => {}
                }
            }
            "assistant" => {
                let blocks = data["message"]["content"].as_array().cloned().unwrap_or_default();
                for block in blocks {
                    match block.get("type").and_then(|t| t.as_str()).unwrap_or("") {
                        "text" => {
                            if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                                if !text.is_empty() {
                                    state.output_lines.push(text.to_string());
                                    self.callbacks.emit_text(text);
                                }
                            }
                        }
                        "tool_use" => {
                            state.tool_calls.push(ToolCallRecord {
                                name: block
                                    .get("name")
                                    .and_then(|n| n.as_str())
                                    .unwrap_or("")
                                    .to_string(),
                                arguments: block.get("input").cloned().unwrap_or_default(),
                                is_error: false,
                            });
                            self.callbacks.emit_tool_call(&block);
                        }
                        "tool_result" => {
                            self.callbacks.emit_tool_call(&block);
                        }
                        _ => {}
                    }
                }
            }
            "result" => {
                if let Some(text) = data.get("result").and_then(|r| r.as_str()) {
                    if !text.is_empty() && state.output_lines.is_empty() {
                        state.output_lines.push(text.to_string());
                        self.callbacks.emit_text(text);
                    }
                    state.final_result = Some(text.to_string());
                }
                if let Some(sid) = data.get("session_id").and_then(|s| s.as_str()) {
                    state.session_id = Some(sid.to_string());
                }
            }
            "system" => {
                if let Some(sid) = data.get("session_id").and_then(|s| s.as_str()) {
                    state.session_id = Some(sid.to_string());
                }
            }
            // message boundaries and user echoes carry no new state
            _ => {}
        }
    }
}

#[async_trait]
impl Backend for StreamingCliBackend {
    fn name(&self) -> &str {
        &self.agent_name
    }

    async fn execute(&self, story: &Story, ctx: &ExecutionContext) -> ExecutionResult {
        let prompt = match &ctx.prompt {
            Some(p) => p.clone(),
            None => crate::prompt::build_story_prompt(story),
        };

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.base_args);
        if let Some(sid) = self.session_id.lock().as_deref() {
            cmd.arg("--resume").arg(sid);
        }
        cmd.arg(&prompt)
            .current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ExecutionResult::failure(
                    &self.agent_name,
                    format!("Command not found: {}", self.command),
                );
            }
            Err(e) => return ExecutionResult::failure(&self.agent_name, e.to_string()),
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        *self.current.lock() = Some(child);

        // Drain stderr concurrently so a chatty CLI cannot deadlock the
        // stdout reader.
        let stderr_task = tokio::spawn(async move {
            let mut lines = Vec::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if !line.trim().is_empty() {
                        lines.push(line);
                    }
                }
            }
            lines
        });

        let mut state = StreamState::default();
        if let Some(stdout) = stdout {
            let mut reader = BufReader::with_capacity(STREAM_BUFFER_BYTES, stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(trimmed) {
                    Ok(data) => self.handle_event(&data, &mut state),
                    Err(_) => {
                        // Non-JSON output is still user-visible text
                        state.output_lines.push(trimmed.to_string());
                        self.callbacks.emit_text(trimmed);
                    }
                }
            }
        }

        let status = {
            let child = self.current.lock().take();
            match child {
                Some(mut child) => child.wait().await,
                None => {
                    return ExecutionResult::failure(&self.agent_name, "Stopped by user");
                }
            }
        };
        let stderr_lines = stderr_task.await.unwrap_or_default();

        if let Some(sid) = &state.session_id {
            *self.session_id.lock() = Some(sid.clone());
        }

        let exit_code = match status {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                return ExecutionResult::failure(&self.agent_name, e.to_string());
            }
        };
        let success = exit_code == 0;
        let error = if success {
            None
        } else {
            let mut msg = format!("{} exited with code {}", self.agent_name, exit_code);
            if !stderr_lines.is_empty() {
                msg.push_str("\nStderr: ");
                msg.push_str(&stderr_lines.join("\n"));
            }
            Some(msg)
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("exit_code".to_string(), serde_json::json!(exit_code));
        if let Some(sid) = &state.session_id {
            metadata.insert("session_id".to_string(), serde_json::json!(sid));
        }
        if let Some(final_result) = &state.final_result {
            metadata.insert("final_result".to_string(), serde_json::json!(final_result));
        }

        ExecutionResult {
            success,
            output: state.output_lines.join("\n"),
            iterations: state.tool_calls.len() as u32,
            error,
            story_id: Some(story.id.clone()),
            agent: self.agent_name.clone(),
            tool_calls: state.tool_calls,
            metadata,
        }
    }

    async fn stop(&self) -> Result<(), BackendError> {
        let mut guard = self.current.lock();
        match guard.as_mut() {
            Some(child) => {
                child.start_kill().map_err(BackendError::Io)?;
                Ok(())
            }
            None => Err(BackendError::NoProcess),
        }
    }

    async fn start_session(&self) -> Result<(), BackendError> {
        // Session id arrives with the first stream; nothing to prepare.
        Ok(())
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
