// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent supervision: launch, track, reconcile, harvest.
//!
//! Launched agents are independent OS processes (or detached in-process
//! tasks) whose terminal state is recorded in per-story result files.
//! The supervisor never joins them with OS wait primitives; it promotes
//! registry rows by reading result files, probing liveness, scanning log
//! trailers, and enforcing timeouts. All promotion happens inside one
//! locked read-modify-write, so transitions are exactly-once even with
//! concurrent reconcilers.

use crate::EngineError;
use cascade_backends::{build_story_prompt, Backend, ExecutionContext, ExternalCliBackend};
use cascade_core::{time_fmt, AgentDef, AgentEntry, Clock, ResultRecord, Story, StoryId};
use cascade_storage::StateStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// What one reconcile pass promoted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub completed: Vec<StoryId>,
    pub failed: Vec<(StoryId, String)>,
    pub still_running: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.completed.is_empty() || !self.failed.is_empty()
    }
}

/// Bucket counts for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Pending progress-log lines collected while the registry lock is held,
/// appended after the write lands.
struct Promotions {
    lines: Vec<(StoryId, String)>,
    report: ReconcileReport,
}

pub struct Supervisor<C: Clock> {
    store: StateStore<C>,
}

impl<C: Clock + 'static> Supervisor<C> {
    pub fn new(store: StateStore<C>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore<C> {
        &self.store
    }

    /// Launch a story on an external CLI agent, detached.
    ///
    /// Returns after the registry row is durable; execution continues in
    /// the background and is harvested by reconciliation.
    pub async fn launch_cli(
        &self,
        story: &Story,
        agent_name: &str,
        def: &AgentDef,
    ) -> Result<(), EngineError> {
        let prompt = self.write_prompt(story)?;
        let backend = ExternalCliBackend::new(agent_name, def.clone(), self.store.clone());

        match backend.launch(story, &prompt).await {
            Ok(pid) => {
                self.insert_entry(story, agent_name, Some(pid), def.timeout_seconds)?;
                self.store
                    .append_progress(story.id.as_str(), &format!("Launched via {agent_name}"));
                Ok(())
            }
            Err(e) => {
                // Spawn failures become failed rows; the batch continues.
                let stamp = self.now_iso();
                let error = e.to_string();
                self.store.update_registry(|reg| {
                    reg.insert_running(AgentEntry {
                        story_id: story.id.clone(),
                        agent: agent_name.to_string(),
                        started_at: stamp.clone(),
                        pid: None,
                        timeout_seconds: def.timeout_seconds,
                        output_log_path: Some(self.store.paths().story_log(story.id.as_str())),
                        result_path: Some(self.store.paths().story_result(story.id.as_str())),
                    });
                    reg.promote_failed(story.id.as_str(), &error, None, stamp.clone());
                })?;
                self.store
                    .append_progress(story.id.as_str(), &format!("[FAILED] {error}"));
                Ok(())
            }
        }
    }

    /// Launch a story on an in-process (task-tool) backend.
    ///
    /// The execution runs as a background task that writes the story's
    /// result file on completion, so reconciliation treats it exactly
    /// like a subprocess — just without a pid to probe.
    pub async fn launch_task(
        &self,
        story: &Story,
        backend: Arc<dyn Backend>,
        timeout_seconds: u64,
    ) -> Result<(), EngineError> {
        let prompt = self.write_prompt(story)?;
        let _ = std::fs::remove_file(self.store.paths().story_result(story.id.as_str()));
        self.insert_entry(story, backend.name(), None, timeout_seconds)?;
        self.store.append_progress(
            story.id.as_str(),
            &format!("Launched via {}", backend.name()),
        );

        let store = self.store.clone();
        let story = story.clone();
        let ctx = ExecutionContext::new(store.paths().root()).with_prompt(prompt);
        tokio::spawn(async move {
            let result = backend.execute(&story, &ctx).await;
            let record = ResultRecord {
                story_id: story.id.clone(),
                success: result.success,
                exit_code: result.success.then_some(0),
                error: result.error.clone(),
                completed_at: time_fmt::format_utc(store.clock().epoch_ms()),
                output_file: None,
            };
            store.write_result(&record);
        });
        Ok(())
    }

    /// One idempotent reconcile pass over every running entry.
    ///
    /// Promotion order per entry: result file, then liveness probe plus
    /// log-trailer scan, then timeout. Re-running on an unchanged
    /// filesystem is a no-op (modulo `updated_at`).
    pub fn reconcile(&self) -> Result<ReconcileReport, EngineError> {
        let now_ms = self.store.clock().epoch_ms();
        let now_iso = time_fmt::format_utc(now_ms);

        let promotions = self.store.update_registry(|reg| {
            let mut promo = Promotions {
                lines: Vec::new(),
                report: ReconcileReport::default(),
            };

            for entry in reg.running.clone() {
                let story_id = entry.story_id.as_str();

                // Step 1: a result file settles it.
                if let Some(result) = self.store.read_result(story_id) {
                    if result.success {
                        reg.promote_completed(
                            story_id,
                            result.exit_code,
                            result.completed_at.clone(),
                        );
                        promo.complete(&entry);
                    } else {
                        let error = result
                            .error
                            .unwrap_or_else(|| "Unknown error".to_string());
                        reg.promote_failed(
                            story_id,
                            &error,
                            result.exit_code,
                            result.completed_at.clone(),
                        );
                        promo.fail(&entry, error);
                    }
                    continue;
                }

                // Step 2: no result file — is the process still alive?
                if let Some(pid) = entry.pid {
                    if !is_pid_alive(pid) {
                        match scan_log_trailer(entry.output_log_path.as_deref()) {
                            Some(LogVerdict::Exited(0)) => {
                                reg.promote_completed(story_id, Some(0), now_iso.clone());
                                promo.complete(&entry);
                            }
                            Some(LogVerdict::Exited(code)) => {
                                let error = format!("Exit code {code}");
                                reg.promote_failed(story_id, &error, Some(code), now_iso.clone());
                                promo.fail(&entry, error);
                            }
                            Some(LogVerdict::TimedOut) => {
                                let error =
                                    format!("Timeout after {} s", entry.timeout_seconds);
                                reg.promote_failed(story_id, &error, None, now_iso.clone());
                                promo.fail(&entry, error);
                            }
                            None => {
                                let error = "Process exited unexpectedly".to_string();
                                reg.promote_failed(story_id, &error, None, now_iso.clone());
                                promo.fail(&entry, error);
                            }
                        }
                        continue;
                    }
                }

                // Step 3: running past its deadline gets killed.
                let started_ms = time_fmt::parse_utc(&entry.started_at).unwrap_or(0);
                let elapsed_secs = now_ms.saturating_sub(started_ms) / 1000;
                if elapsed_secs > entry.timeout_seconds {
                    if let Some(pid) = entry.pid {
                        kill_pid(pid);
                    }
                    let error = format!("Timeout after {} s", entry.timeout_seconds);
                    reg.promote_failed(story_id, &error, None, now_iso.clone());
                    promo.fail(&entry, error);
                    continue;
                }

                promo.report.still_running += 1;
            }

            promo
        })?;

        for (story_id, line) in &promotions.lines {
            self.store.append_progress(story_id.as_str(), line);
        }
        if promotions.report.changed() {
            tracing::info!(
                completed = promotions.report.completed.len(),
                failed = promotions.report.failed.len(),
                running = promotions.report.still_running,
                "reconciled agent registry"
            );
        }
        Ok(promotions.report)
    }

    /// Poll until the named stories (or every running entry) are
    /// terminal. Returns true when everything settled, false on timeout.
    pub async fn wait_for(
        &self,
        story_ids: Option<&[StoryId]>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool, EngineError> {
        let started = self.store.clock().now();
        loop {
            self.reconcile()?;

            let reg = self.store.read_registry();
            let outstanding = match story_ids {
                Some(ids) => ids
                    .iter()
                    .filter(|id| reg.running_entry(id.as_str()).is_some())
                    .count(),
                None => reg.running.len(),
            };
            if outstanding == 0 {
                return Ok(true);
            }
            if self.store.clock().now().duration_since(started) >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Kill a running story's process and record the failure.
    ///
    /// Entries without a pid (task-tool backends) refuse with an error.
    pub fn stop(&self, story_id: &str) -> Result<(), EngineError> {
        let now_iso = self.now_iso();
        let stopped = self.store.update_registry(|reg| {
            let Some(entry) = reg.running_entry(story_id) else {
                return Err(EngineError::StoryNotFound(story_id.to_string()));
            };
            let Some(pid) = entry.pid else {
                return Err(EngineError::NoProcess(story_id.to_string()));
            };
            kill_pid(pid);
            reg.promote_failed(story_id, "Stopped by user", None, now_iso.clone());
            Ok(())
        })?;
        stopped?;
        self.store
            .append_progress(story_id, "[FAILED] Stopped by user");
        Ok(())
    }

    /// Bucket counts.
    pub fn status_summary(&self) -> StatusSummary {
        let reg = self.store.read_registry();
        StatusSummary {
            running: reg.running.len(),
            completed: reg.completed.len(),
            failed: reg.failed.len(),
        }
    }

    /// Drop terminal rows older than `max_age`.
    pub fn cleanup_stale_entries(&self, max_age: Duration) -> Result<usize, EngineError> {
        let cutoff_ms = self
            .store
            .clock()
            .epoch_ms()
            .saturating_sub(max_age.as_millis() as u64);
        let cutoff = time_fmt::format_utc(cutoff_ms);
        Ok(self
            .store
            .update_registry(|reg| reg.prune_terminal_before(&cutoff))?)
    }

    fn write_prompt(&self, story: &Story) -> Result<String, EngineError> {
        let prompt = build_story_prompt(story);
        let path = self.store.paths().story_prompt(story.id.as_str());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(cascade_backends::BackendError::Io)?;
        }
        std::fs::write(&path, &prompt).map_err(cascade_backends::BackendError::Io)?;
        Ok(prompt)
    }

    fn insert_entry(
        &self,
        story: &Story,
        agent_name: &str,
        pid: Option<u32>,
        timeout_seconds: u64,
    ) -> Result<(), EngineError> {
        let entry = AgentEntry {
            story_id: story.id.clone(),
            agent: agent_name.to_string(),
            started_at: self.now_iso(),
            pid,
            timeout_seconds,
            output_log_path: Some(self.store.paths().story_log(story.id.as_str())),
            result_path: Some(self.store.paths().story_result(story.id.as_str())),
        };
        self.store.update_registry(|reg| reg.insert_running(entry))?;
        Ok(())
    }

    fn now_iso(&self) -> String {
        time_fmt::format_utc(self.store.clock().epoch_ms())
    }
}

impl Promotions {
    fn complete(&mut self, entry: &AgentEntry) {
        self.report.completed.push(entry.story_id.clone());
        self.lines.push((
            entry.story_id.clone(),
            format!("[COMPLETE] via {}", entry.agent),
        ));
    }

    fn fail(&mut self, entry: &AgentEntry, error: String) {
        self.lines.push((
            entry.story_id.clone(),
            format!("[FAILED] {error} (via {})", entry.agent),
        ));
        self.report.failed.push((entry.story_id.clone(), error));
    }
}

/// Verdict from the tail of an agent log.
enum LogVerdict {
    Exited(i32),
    TimedOut,
}

/// Scan an agent log for the `# Exit Code: N` trailer or a `[TIMEOUT]`
/// marker. Later lines win.
fn scan_log_trailer(log_path: Option<&Path>) -> Option<LogVerdict> {
    let content = std::fs::read_to_string(log_path?).ok()?;
    for line in content.lines().rev() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("# Exit Code:") {
            if let Ok(code) = rest.trim().parse::<i32>() {
                return Some(LogVerdict::Exited(code));
            }
        }
        if trimmed == "[TIMEOUT]" {
            return Some(LogVerdict::TimedOut);
        }
    }
    None
}

#[cfg(unix)]
fn is_pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(windows)]
fn is_pid_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Best-effort kill; reconciliation handles the aftermath either way.
#[cfg(unix)]
fn kill_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        tracing::debug!(pid, error = %e, "kill failed");
    }
}

#[cfg(windows)]
fn kill_pid(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .output();
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
