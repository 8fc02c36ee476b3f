// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The top-level iteration loop.
//!
//! Drives the plan batch by batch: launch every ready story, poll the
//! supervisor until the batch is terminal, verify completed stories
//! through the quality gates, and route failures through the retry
//! manager with agent escalation. Progress is observable through
//! [`EngineEvent`]s; the loop itself holds no back-references.

use crate::gates::{should_allow_progression, GateRunner};
use crate::retry::RetryManager;
use crate::scheduler;
use crate::supervisor::Supervisor;
use crate::EngineError;
use cascade_backends::{AgentOverrides, Backend, Detector, PhaseAgentManager, SelectedAgent};
use cascade_core::{
    time_fmt, AgentDef, AgentKind, AgentsConfig, Clock, EngineEvent, ErrorType, ExecutionPhase,
    GateConfig, Plan, Story, StoryId, StoryStatus,
};
use cascade_storage::StateStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// How far one `run` call drives the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Drain the plan.
    UntilComplete,
    /// At most this many supervisor polls, then checkpoint and return.
    MaxIterations(u32),
    /// One batch, then return.
    BatchComplete,
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every story is terminal.
    Complete,
    /// One batch finished (BatchComplete mode).
    BatchDone,
    /// The iteration budget ran out mid-batch.
    IterationBudget,
    /// Cooperative pause was requested.
    Paused,
    /// Cooperative stop was requested.
    Stopped,
    /// The batch wait timed out with agents still running.
    TimedOut,
}

/// Cooperative pause/stop switch shared with the caller. The loop checks
/// it between stories and between polls; running subprocesses continue
/// until they finish or are stopped explicitly.
#[derive(Clone, Default)]
pub struct ControlHandle {
    paused: Arc<AtomicBool>,
    stop: CancellationToken,
}

impl ControlHandle {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// Creates in-process backends for `task-tool` agents.
pub trait BackendFactory: Send + Sync {
    fn create(&self, agent_name: &str, def: &AgentDef) -> Option<Arc<dyn Backend>>;
}

/// Loop tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound for one batch to settle.
    pub batch_timeout: Duration,
    /// Sleep between reconcile polls.
    pub poll_interval: Duration,
    pub overrides: AgentOverrides,
    pub gates: Vec<GateConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(2),
            overrides: AgentOverrides::default(),
            gates: Vec::new(),
        }
    }
}

/// The `.execution-context.json` checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ExecutionCheckpoint {
    current_batch: usize,
    completed: Vec<String>,
    failed: Vec<String>,
    updated_at: String,
}

enum WaitResult {
    Settled,
    TimedOut,
    BudgetExhausted,
}

pub struct Orchestrator<C: Clock + 'static> {
    store: StateStore<C>,
    supervisor: Supervisor<C>,
    gate_runner: GateRunner,
    retry: RetryManager<C>,
    detector: Detector<C>,
    agents_config: AgentsConfig,
    config: OrchestratorConfig,
    factory: Option<Arc<dyn BackendFactory>>,
    events: Option<UnboundedSender<EngineEvent>>,
    control: ControlHandle,
}

impl<C: Clock + 'static> Orchestrator<C> {
    pub fn new(store: StateStore<C>, config: OrchestratorConfig) -> Self {
        let clock = store.clock().clone();
        let agents_config: AgentsConfig = store
            .read_json_safe(&store.paths().agents_config())
            .unwrap_or_default();
        let root = store.paths().root().to_path_buf();
        Self {
            supervisor: Supervisor::new(store.clone()),
            gate_runner: GateRunner::new(root),
            retry: RetryManager::new(clock),
            detector: Detector::new(store.clone()),
            agents_config,
            store,
            config,
            factory: None,
            events: None,
            control: ControlHandle::default(),
        }
    }

    pub fn with_backend_factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Register the event sink; all subsequent events flow to it.
    pub fn set_event_sink(&mut self, sink: UnboundedSender<EngineEvent>) {
        self.events = Some(sink);
    }

    /// Handle for cooperative pause/stop from another task.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn supervisor(&self) -> &Supervisor<C> {
        &self.supervisor
    }

    pub fn retry_manager(&self) -> &RetryManager<C> {
        &self.retry
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.events {
            let _ = sink.send(event);
        }
    }

    /// Run the plan according to `mode`.
    pub async fn run(&mut self, mode: RunMode) -> Result<RunOutcome, EngineError> {
        // A crashed predecessor may have left locks behind.
        self.store.locks().cleanup_stale_locks();

        let mut plan = self.store.read_plan().ok_or(EngineError::PlanMissing)?;
        let errors = plan.validate();
        if !errors.is_empty() {
            return Err(EngineError::InvalidPlan(errors));
        }

        let batch_plan = scheduler::batches(&plan);
        if batch_plan.has_cycle() {
            // validate() catches declared cycles; this guards recomputation.
            return Err(EngineError::InvalidPlan(vec![
                cascade_core::PlanError::Cycle(batch_plan.cycle),
            ]));
        }

        let mut polls_budget = match mode {
            RunMode::MaxIterations(n) => Some(n),
            _ => None,
        };

        for (index, batch) in batch_plan.batches.iter().enumerate() {
            let stories: Vec<Story> = batch
                .iter()
                .filter_map(|id| plan.get(id.as_str()).cloned())
                .filter(|s| !s.status.is_terminal())
                .collect();
            if stories.is_empty() {
                continue;
            }

            self.emit(EngineEvent::BatchStarted {
                index,
                size: stories.len(),
            });
            tracing::info!(batch = index, size = stories.len(), "starting batch");

            for story in &stories {
                if self.control.is_stopped() {
                    self.checkpoint(index, &plan);
                    return Ok(RunOutcome::Stopped);
                }
                if self.control.is_paused() {
                    self.checkpoint(index, &plan);
                    return Ok(RunOutcome::Paused);
                }

                let selection = self.select_agent(story, ExecutionPhase::Implementation);
                if let Some(from) = &selection.fallback_from {
                    self.store.append_progress(
                        story.id.as_str(),
                        &format!("[FALLBACK] {from} unavailable, using {}", selection.agent),
                    );
                }

                plan.set_status(story.id.as_str(), StoryStatus::InProgress);
                self.store.write_plan(&plan)?;

                self.launch(story, &selection.agent).await?;
                self.emit(EngineEvent::StoryStarted {
                    story_id: story.id.clone(),
                    agent: selection.agent,
                });
            }

            let ids: Vec<StoryId> = stories.iter().map(|s| s.id.clone()).collect();
            let outcome = self
                .settle_batch(&mut plan, ids, &mut polls_budget)
                .await?;
            match outcome {
                WaitResult::Settled => {}
                WaitResult::TimedOut => {
                    self.checkpoint(index, &plan);
                    return Ok(RunOutcome::TimedOut);
                }
                WaitResult::BudgetExhausted => {
                    self.checkpoint(index, &plan);
                    return Ok(RunOutcome::IterationBudget);
                }
            }

            self.emit(EngineEvent::BatchCompleted { index });
            self.checkpoint(index + 1, &plan);

            if mode == RunMode::BatchComplete {
                return Ok(RunOutcome::BatchDone);
            }
            if self.control.is_stopped() {
                return Ok(RunOutcome::Stopped);
            }
            if self.control.is_paused() {
                return Ok(RunOutcome::Paused);
            }
        }

        self.checkpoint(batch_plan.batches.len(), &plan);
        Ok(RunOutcome::Complete)
    }

    /// Wait for a batch, gate the completions, and relaunch retries
    /// until nothing is pending.
    async fn settle_batch(
        &mut self,
        plan: &mut Plan,
        mut pending: Vec<StoryId>,
        polls_budget: &mut Option<u32>,
    ) -> Result<WaitResult, EngineError> {
        while !pending.is_empty() {
            match self.wait_for_stories(&pending, polls_budget).await? {
                WaitResult::Settled => {}
                other => return Ok(other),
            }

            let registry = self.store.read_registry();
            let mut relaunched = Vec::new();

            for story_id in &pending {
                // The current attempt's result file decides; earlier
                // attempts leave stale terminal rows behind (a relaunch
                // removes the result file first).
                let succeeded = match self.store.read_result(story_id.as_str()) {
                    Some(record) => record.success,
                    None => {
                        let failed = registry
                            .failed
                            .iter()
                            .any(|e| e.story_id == story_id.as_str());
                        !failed
                            && registry
                                .completed
                                .iter()
                                .any(|e| e.story_id == story_id.as_str())
                    }
                };

                if succeeded {
                    if self.gate_story(story_id).await? {
                        plan.set_status(story_id.as_str(), StoryStatus::Complete);
                        self.store.write_plan(plan)?;
                        self.emit(EngineEvent::StoryFinished {
                            story_id: story_id.clone(),
                            success: true,
                        });
                        continue;
                    }
                    // Required gate failed
                    if self.try_retry(plan, story_id, ErrorType::QualityGate).await? {
                        relaunched.push(story_id.clone());
                    }
                    continue;
                }

                let error_type = registry
                    .failed
                    .iter()
                    .rfind(|e| e.story_id == story_id.as_str())
                    .map(|row| RetryManager::<C>::classify_error(&row.error))
                    .unwrap_or(ErrorType::Unknown);
                if self.try_retry(plan, story_id, error_type).await? {
                    relaunched.push(story_id.clone());
                }
            }

            pending = relaunched;
        }
        Ok(WaitResult::Settled)
    }

    /// Run the configured gates for one completed story.
    async fn gate_story(&mut self, story_id: &StoryId) -> Result<bool, EngineError> {
        if self.config.gates.is_empty() {
            return Ok(true);
        }
        let outputs = self
            .gate_runner
            .execute_all(story_id.as_str(), &self.config.gates)
            .await;
        for output in outputs.values() {
            self.emit(EngineEvent::GateResult {
                story_id: story_id.clone(),
                gate: output.name.clone(),
                passed: output.passed,
                required: output.required,
            });
        }
        if should_allow_progression(&outputs) {
            return Ok(true);
        }
        let failed_names: Vec<&str> = outputs
            .values()
            .filter(|o| o.required && !o.passed)
            .map(|o| o.name.as_str())
            .collect();
        self.store.append_progress(
            story_id.as_str(),
            &format!("[FAILED] quality gate(s): {}", failed_names.join(", ")),
        );
        Ok(false)
    }

    /// Record a failure and relaunch with the next agent when retries
    /// remain. Returns true when a relaunch was issued.
    async fn try_retry(
        &mut self,
        plan: &mut Plan,
        story_id: &StoryId,
        error_type: ErrorType,
    ) -> Result<bool, EngineError> {
        let Some(story) = plan.get(story_id.as_str()).cloned() else {
            return Ok(false);
        };

        let registry = self.store.read_registry();
        let (last_agent, excerpt) = if error_type == ErrorType::QualityGate {
            // The execution itself succeeded; attribute the agent that
            // produced the gated output.
            registry
                .completed
                .iter()
                .rfind(|e| e.story_id == story_id.as_str())
                .map(|e| (e.agent.clone(), "required quality gate failed".to_string()))
                .unwrap_or_else(|| ("unknown".to_string(), error_type.to_string()))
        } else {
            registry
                .failed
                .iter()
                .rfind(|e| e.story_id == story_id.as_str())
                .map(|e| (e.agent.clone(), e.error.clone()))
                .unwrap_or_else(|| ("unknown".to_string(), error_type.to_string()))
        };

        let attempt = self
            .retry
            .record_failure(story_id, &last_agent, error_type, &excerpt);

        if !self.retry.can_retry(story_id.as_str()) || self.control.is_stopped() {
            plan.set_status(story_id.as_str(), StoryStatus::Failed);
            self.store.write_plan(plan)?;
            self.emit(EngineEvent::StoryFinished {
                story_id: story_id.clone(),
                success: false,
            });
            return Ok(false);
        }

        let manager = PhaseAgentManager::new(&self.agents_config, &self.detector);
        let next_agent = manager.retry_agent(&last_agent);
        self.store.append_progress(
            story_id.as_str(),
            &format!("[RETRY] attempt {attempt} via {next_agent}"),
        );
        self.emit(EngineEvent::RetryDecided {
            story_id: story_id.clone(),
            agent: next_agent.clone(),
            attempt,
        });

        self.launch(&story, &next_agent).await?;
        Ok(true)
    }

    async fn wait_for_stories(
        &mut self,
        ids: &[StoryId],
        polls_budget: &mut Option<u32>,
    ) -> Result<WaitResult, EngineError> {
        let started = self.store.clock().now();
        loop {
            if let Some(budget) = polls_budget {
                if *budget == 0 {
                    return Ok(WaitResult::BudgetExhausted);
                }
                *budget -= 1;
            }

            self.supervisor.reconcile()?;
            let registry = self.store.read_registry();
            let outstanding = ids
                .iter()
                .filter(|id| registry.running_entry(id.as_str()).is_some())
                .count();
            if outstanding == 0 {
                return Ok(WaitResult::Settled);
            }
            if self
                .store
                .clock()
                .now()
                .duration_since(started)
                >= self.config.batch_timeout
            {
                tracing::warn!(outstanding, "batch wait timed out");
                return Ok(WaitResult::TimedOut);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn select_agent(&self, story: &Story, phase: ExecutionPhase) -> SelectedAgent {
        let manager = PhaseAgentManager::new(&self.agents_config, &self.detector);
        manager.select(story, phase, &self.config.overrides)
    }

    /// Launch one story on the named agent.
    async fn launch(&self, story: &Story, agent_name: &str) -> Result<(), EngineError> {
        let def = self
            .agents_config
            .get(agent_name)
            .cloned()
            .unwrap_or_else(|| default_cli_def(agent_name));

        match def.kind {
            AgentKind::Cli => self.supervisor.launch_cli(story, agent_name, &def).await,
            AgentKind::TaskTool => {
                let backend = self
                    .factory
                    .as_ref()
                    .and_then(|f| f.create(agent_name, &def))
                    .ok_or_else(|| EngineError::AgentNotFound(agent_name.to_string()))?;
                self.supervisor
                    .launch_task(story, backend, def.timeout_seconds)
                    .await
            }
        }
    }

    fn checkpoint(&self, current_batch: usize, plan: &Plan) {
        let checkpoint = ExecutionCheckpoint {
            current_batch,
            completed: plan
                .ids_with_status(StoryStatus::Complete)
                .iter()
                .map(|id| id.to_string())
                .collect(),
            failed: plan
                .ids_with_status(StoryStatus::Failed)
                .iter()
                .map(|id| id.to_string())
                .collect(),
            updated_at: time_fmt::format_utc(self.store.clock().epoch_ms()),
        };
        self.store
            .write_json_safe(&self.store.paths().execution_context(), &checkpoint);
    }
}

/// An unconfigured agent is treated as a CLI on `PATH`; if the binary is
/// absent the spawn failure is recorded and the batch continues.
fn default_cli_def(agent_name: &str) -> AgentDef {
    AgentDef {
        kind: AgentKind::Cli,
        command: agent_name.to_string(),
        args: vec!["{prompt}".to_string()],
        ..AgentDef::default()
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
