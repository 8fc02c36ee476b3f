// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External CLI backend.
//!
//! Spawns a configured binary with the story prompt substituted into its
//! argument template. Two launch modes:
//!
//! - [`ExternalCliBackend::launch`] — detached: the child gets its own
//!   session/process group, stdout+stderr stream into the story log, and
//!   a reaper task writes the durable result record on exit. If the
//!   orchestrator dies first, a later supervisor reaps the story from the
//!   result file or the `# Exit Code:` log trailer.
//! - [`Backend::execute`] — attached: waits for completion under the
//!   agent's timeout and folds everything into an [`ExecutionResult`].

use crate::{Backend, BackendError, ExecutionContext};
use async_trait::async_trait;
use cascade_core::{time_fmt, AgentDef, Clock, ExecutionResult, ResultRecord, Story, StoryId};
use cascade_storage::StateStore;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Marker line appended when an attached execution is killed on timeout.
pub const TIMEOUT_MARKER: &str = "[TIMEOUT]";

pub struct ExternalCliBackend<C: Clock> {
    agent_name: String,
    def: AgentDef,
    store: StateStore<C>,
    current: Mutex<Option<Child>>,
}

impl<C: Clock + 'static> ExternalCliBackend<C> {
    pub fn new(agent_name: impl Into<String>, def: AgentDef, store: StateStore<C>) -> Self {
        Self {
            agent_name: agent_name.into(),
            def,
            store,
            current: Mutex::new(None),
        }
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.def.timeout_seconds
    }

    /// Expand the argument template for one story.
    ///
    /// If no argument mentions `{prompt}`, the prompt is appended as the
    /// final argument.
    fn expand_args(&self, prompt: &str, story_id: &str, working_dir: &Path) -> Vec<String> {
        let working_dir = working_dir.to_string_lossy();
        let mut args: Vec<String> = self
            .def
            .args
            .iter()
            .map(|a| {
                a.replace("{prompt}", prompt)
                    .replace("{story_id}", story_id)
                    .replace("{working_dir}", &working_dir)
            })
            .collect();
        if !self.def.args.iter().any(|a| a.contains("{prompt}")) {
            args.push(prompt.to_string());
        }
        args
    }

    fn build_command(&self, args: &[String], working_dir: &Path, log: std::fs::File) -> Result<Command, BackendError> {
        let stderr = log.try_clone()?;
        let mut cmd = Command::new(&self.def.command);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr));
        // Child environment is the current environment shallow-merged
        // with the agent's env map.
        for (key, value) in &self.def.env {
            cmd.env(key, value);
        }
        Ok(cmd)
    }

    fn detach(cmd: &mut Command) {
        #[cfg(unix)]
        {
            // New process group: the child survives the orchestrator and
            // is reaped later through its result file.
            cmd.process_group(0);
        }
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
        }
    }

    fn write_log_header(&self, log_path: &Path, story_id: &str, args: &[String]) {
        let header = format!(
            "# Agent: {}\n# Story: {}\n# Command: {} {}\n# Started: {}\n",
            self.agent_name,
            story_id,
            self.def.command,
            args.join(" "),
            time_fmt::format_utc(self.store.clock().epoch_ms()),
        );
        if let Err(e) = std::fs::write(log_path, header) {
            tracing::warn!(story_id, error = %e, "failed to write log header");
        }
    }

    fn map_spawn_error(&self, e: std::io::Error) -> BackendError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BackendError::CommandNotFound(self.def.command.clone())
        } else {
            BackendError::Spawn(e.to_string())
        }
    }

    /// Launch detached and return the child pid immediately.
    ///
    /// A reaper task appends the `# Exit Code: N` trailer and writes the
    /// result record when the child exits. Both artifacts are advisory:
    /// reconciliation also handles their absence.
    pub async fn launch(&self, story: &Story, prompt: &str) -> Result<u32, BackendError> {
        let story_id = story.id.as_str();
        let paths = self.store.paths();
        std::fs::create_dir_all(paths.outputs_dir())?;

        // A relaunch supersedes any previous attempt's result.
        let _ = std::fs::remove_file(paths.story_result(story_id));

        let log_path = paths.story_log(story_id);
        let working_dir = paths.root().to_path_buf();
        let args = self.expand_args(prompt, story_id, &working_dir);
        self.write_log_header(&log_path, story_id, &args);

        let log = OpenOptions::new().append(true).open(&log_path)?;
        let mut cmd = self.build_command(&args, &working_dir, log)?;
        Self::detach(&mut cmd);
        cmd.kill_on_drop(false);

        let mut child = cmd.spawn().map_err(|e| self.map_spawn_error(e))?;
        let pid = child.id().ok_or_else(|| {
            BackendError::Spawn("child exited before pid could be read".to_string())
        })?;

        tracing::info!(story_id, agent = %self.agent_name, pid, "launched detached agent");

        let store = self.store.clone();
        let id = story.id.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let exit_code = status.code().unwrap_or(-1);
                    append_exit_trailer(&log_path, exit_code);
                    write_result(&store, &id, exit_code, &log_path);
                }
                Err(e) => {
                    tracing::warn!(story_id = %id, error = %e, "failed to await detached agent");
                }
            }
        });

        Ok(pid)
    }
}

fn append_exit_trailer(log_path: &Path, exit_code: i32) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .and_then(|mut f| writeln!(f, "# Exit Code: {exit_code}"));
    if let Err(e) = result {
        tracing::warn!(log = %log_path.display(), error = %e, "failed to append exit trailer");
    }
}

fn write_result<C: Clock>(store: &StateStore<C>, story_id: &StoryId, exit_code: i32, log_path: &Path) {
    let record = ResultRecord {
        story_id: story_id.clone(),
        success: exit_code == 0,
        exit_code: Some(exit_code),
        error: (exit_code != 0).then(|| format!("Exit code {exit_code}")),
        completed_at: time_fmt::format_utc(store.clock().epoch_ms()),
        output_file: Some(log_path.to_path_buf()),
    };
    store.write_result(&record);
}

#[async_trait]
impl<C: Clock + 'static> Backend for ExternalCliBackend<C> {
    fn name(&self) -> &str {
        &self.agent_name
    }

    async fn execute(&self, story: &Story, ctx: &ExecutionContext) -> ExecutionResult {
        let story_id = story.id.as_str();
        let prompt = match &ctx.prompt {
            Some(p) => p.clone(),
            None => crate::prompt::build_story_prompt(story),
        };

        let paths = self.store.paths();
        if let Err(e) = std::fs::create_dir_all(paths.outputs_dir()) {
            return ExecutionResult::failure(&self.agent_name, e.to_string());
        }
        let log_path = paths.story_log(story_id);
        let args = self.expand_args(&prompt, story_id, &ctx.working_dir);
        self.write_log_header(&log_path, story_id, &args);

        let log = match OpenOptions::new().append(true).open(&log_path) {
            Ok(f) => f,
            Err(e) => return ExecutionResult::failure(&self.agent_name, e.to_string()),
        };
        let mut cmd = match self.build_command(&args, &ctx.working_dir, log) {
            Ok(c) => c,
            Err(e) => return ExecutionResult::failure(&self.agent_name, e.to_string()),
        };

        match cmd.spawn() {
            Ok(child) => *self.current.lock() = Some(child),
            Err(e) => {
                let err = self.map_spawn_error(e);
                return ExecutionResult::failure(&self.agent_name, err.to_string());
            }
        }

        // Cooperative wait: poll the child so stop() can kill it through
        // the shared handle at any point.
        let timeout = Duration::from_secs(self.def.timeout_seconds);
        let started = self.store.clock().now();
        let mut result = loop {
            let status = {
                let mut guard = self.current.lock();
                match guard.as_mut() {
                    Some(child) => child.try_wait(),
                    None => break ExecutionResult::failure(&self.agent_name, "Stopped by user"),
                }
            };
            match status {
                Ok(Some(status)) => {
                    self.current.lock().take();
                    let exit_code = status.code().unwrap_or(-1);
                    append_exit_trailer(&log_path, exit_code);
                    let output = std::fs::read_to_string(&log_path).unwrap_or_default();
                    break ExecutionResult {
                        success: exit_code == 0,
                        output,
                        error: (exit_code != 0).then(|| format!("Exit code {exit_code}")),
                        ..ExecutionResult::default()
                    };
                }
                Ok(None) => {
                    if self.store.clock().now().duration_since(started) > timeout {
                        if let Some(mut child) = self.current.lock().take() {
                            let _ = child.start_kill();
                        }
                        let trailer_result = OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(&log_path)
                            .and_then(|mut f| writeln!(f, "{TIMEOUT_MARKER}"));
                        if let Err(e) = trailer_result {
                            tracing::warn!(story_id, error = %e, "failed to append timeout marker");
                        }
                        break ExecutionResult::failure(
                            &self.agent_name,
                            format!("Timeout after {} s", self.def.timeout_seconds),
                        );
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => {
                    self.current.lock().take();
                    break ExecutionResult::failure(&self.agent_name, e.to_string());
                }
            }
        };
        result.agent = self.agent_name.clone();
        result.story_id = Some(story.id.clone());
        result
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
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod tests;
