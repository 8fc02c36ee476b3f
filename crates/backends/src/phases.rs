// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase-based agent selection.
//!
//! Selection is a priority-ordered lookup per execution phase:
//!
//! 1. Global command-line override
//! 2. Phase-specific command-line override
//! 3. `story.agent` when that agent is available
//! 4. Story-type override for the phase
//! 5. Phase default agent
//! 6. Phase fallback chain entries, skipping unavailable ones
//! 7. The always-available default

use crate::Detector;
use cascade_core::{AgentsConfig, Clock, ExecutionPhase, PhaseDefaults, Story, StoryType};
use std::collections::HashMap;

/// The terminal fallback; assumed installable everywhere.
pub const ALWAYS_AVAILABLE_AGENT: &str = "claude-code";

/// Availability oracle, usually a [`Detector`].
pub trait Availability {
    fn is_available(&self, agent: &str) -> bool;
}

impl<C: Clock> Availability for Detector<C> {
    fn is_available(&self, agent: &str) -> bool {
        Detector::is_available(self, agent)
    }
}

/// Command-line overrides for agent selection.
#[derive(Debug, Clone, Default)]
pub struct AgentOverrides {
    /// `--agent`: overrides every phase.
    pub global_agent: Option<String>,
    pub planning_agent: Option<String>,
    pub impl_agent: Option<String>,
    pub retry_agent: Option<String>,
    pub review_agent: Option<String>,
    /// `--no-fallback`: use overrides verbatim even when undetected.
    pub no_fallback: bool,
}

impl AgentOverrides {
    fn for_phase(&self, phase: ExecutionPhase) -> Option<&str> {
        if let Some(global) = &self.global_agent {
            return Some(global);
        }
        match phase {
            ExecutionPhase::Planning => self.planning_agent.as_deref(),
            ExecutionPhase::Implementation => self.impl_agent.as_deref(),
            ExecutionPhase::Retry => self.retry_agent.as_deref(),
            ExecutionPhase::Review => self.review_agent.as_deref(),
            ExecutionPhase::Refactor => None,
        }
    }
}

/// The selection result; `fallback_from` names the preferred agent when
/// availability forced a substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAgent {
    pub agent: String,
    pub fallback_from: Option<String>,
}

/// Per-phase selection over an [`AgentsConfig`] and an availability
/// oracle.
pub struct PhaseAgentManager<'a, A: Availability> {
    phases: HashMap<ExecutionPhase, PhaseDefaults>,
    story_type_defaults: HashMap<StoryType, String>,
    availability: &'a A,
}

impl<'a, A: Availability> PhaseAgentManager<'a, A> {
    pub fn new(config: &AgentsConfig, availability: &'a A) -> Self {
        let mut phases = default_phase_configs();
        for (name, defaults) in &config.phase_defaults {
            if let Some(phase) = parse_phase(name) {
                phases.insert(phase, defaults.clone());
            }
        }

        let mut story_type_defaults = default_story_type_agents();
        for (name, agent) in &config.story_type_defaults {
            if let Some(story_type) = parse_story_type(name) {
                story_type_defaults.insert(story_type, agent.clone());
            }
        }

        Self {
            phases,
            story_type_defaults,
            availability,
        }
    }

    /// Resolve the agent for a story in a phase.
    pub fn select(
        &self,
        story: &Story,
        phase: ExecutionPhase,
        overrides: &AgentOverrides,
    ) -> SelectedAgent {
        let phase_config = self.phases.get(&phase);
        let mut first_choice: Option<String> = None;

        // 1 & 2: command-line overrides
        if let Some(agent) = overrides.for_phase(phase) {
            first_choice.get_or_insert_with(|| agent.to_string());
            if overrides.no_fallback || self.agent_available(agent) {
                return SelectedAgent {
                    agent: agent.to_string(),
                    fallback_from: None,
                };
            }
        }

        // 3: story-level preference
        if let Some(agent) = &story.agent {
            first_choice.get_or_insert_with(|| agent.clone());
            if overrides.no_fallback || self.agent_available(agent) {
                return self.resolved(agent.clone(), first_choice);
            }
        }

        // 4: story-type override for this phase
        let story_type = StoryType::infer(story);
        if let Some(agent) =
            phase_config.and_then(|c| c.story_type_overrides.get(story_type.as_str()))
        {
            first_choice.get_or_insert_with(|| agent.clone());
            if overrides.no_fallback || self.agent_available(agent) {
                return self.resolved(agent.clone(), first_choice);
            }
        }

        // 5: phase default
        if let Some(config) = phase_config {
            first_choice.get_or_insert_with(|| config.default_agent.clone());
            if overrides.no_fallback || self.agent_available(&config.default_agent) {
                return self.resolved(config.default_agent.clone(), first_choice);
            }

            // 6: fallback chain
            for candidate in &config.fallback_chain {
                if self.agent_available(candidate) {
                    return self.resolved(candidate.clone(), first_choice);
                }
            }
        }

        // 7: always-available default
        self.resolved(ALWAYS_AVAILABLE_AGENT.to_string(), first_choice)
    }

    /// Next agent for a retry, walking the retry-phase chain past the
    /// agent that just failed.
    pub fn retry_agent(&self, current_agent: &str) -> String {
        if let Some(config) = self.phases.get(&ExecutionPhase::Retry) {
            let chain =
                std::iter::once(&config.default_agent).chain(config.fallback_chain.iter());
            for candidate in chain {
                if candidate != current_agent && self.agent_available(candidate) {
                    return candidate.clone();
                }
            }
        }
        ALWAYS_AVAILABLE_AGENT.to_string()
    }

    /// Configured default agent for a story type.
    pub fn story_type_agent(&self, story_type: StoryType) -> &str {
        self.story_type_defaults
            .get(&story_type)
            .map(String::as_str)
            .unwrap_or(ALWAYS_AVAILABLE_AGENT)
    }

    /// `claude-code` is assumed installable everywhere; everything else
    /// asks the availability oracle.
    fn agent_available(&self, agent: &str) -> bool {
        agent == ALWAYS_AVAILABLE_AGENT || self.availability.is_available(agent)
    }

    fn resolved(&self, agent: String, first_choice: Option<String>) -> SelectedAgent {
        let fallback_from = first_choice.filter(|first| first != &agent);
        SelectedAgent {
            agent,
            fallback_from,
        }
    }
}

fn parse_phase(name: &str) -> Option<ExecutionPhase> {
    ExecutionPhase::ALL.into_iter().find(|p| p.as_str() == name)
}

fn parse_story_type(name: &str) -> Option<StoryType> {
    [
        StoryType::Feature,
        StoryType::Bugfix,
        StoryType::Refactor,
        StoryType::Test,
        StoryType::Documentation,
        StoryType::Infrastructure,
        StoryType::Unknown,
    ]
    .into_iter()
    .find(|t| t.as_str() == name)
}

fn phase_defaults(
    default_agent: &str,
    fallback_chain: &[&str],
    story_type_overrides: &[(&str, &str)],
) -> PhaseDefaults {
    PhaseDefaults {
        default_agent: default_agent.to_string(),
        fallback_chain: fallback_chain.iter().map(|s| s.to_string()).collect(),
        story_type_overrides: story_type_overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn default_phase_configs() -> HashMap<ExecutionPhase, PhaseDefaults> {
    HashMap::from([
        (
            ExecutionPhase::Planning,
            phase_defaults("codex", &[ALWAYS_AVAILABLE_AGENT], &[]),
        ),
        (
            ExecutionPhase::Implementation,
            phase_defaults(
                ALWAYS_AVAILABLE_AGENT,
                &["codex", "aider"],
                &[("refactor", "aider"), ("bugfix", "codex")],
            ),
        ),
        (
            ExecutionPhase::Retry,
            phase_defaults(ALWAYS_AVAILABLE_AGENT, &["aider"], &[]),
        ),
        (
            ExecutionPhase::Refactor,
            phase_defaults("aider", &[ALWAYS_AVAILABLE_AGENT], &[]),
        ),
        (
            ExecutionPhase::Review,
            phase_defaults(ALWAYS_AVAILABLE_AGENT, &["codex"], &[]),
        ),
    ])
}

fn default_story_type_agents() -> HashMap<StoryType, String> {
    HashMap::from([
        (StoryType::Feature, ALWAYS_AVAILABLE_AGENT.to_string()),
        (StoryType::Bugfix, "codex".to_string()),
        (StoryType::Refactor, "aider".to_string()),
        (StoryType::Test, ALWAYS_AVAILABLE_AGENT.to_string()),
        (StoryType::Documentation, ALWAYS_AVAILABLE_AGENT.to_string()),
        (StoryType::Infrastructure, ALWAYS_AVAILABLE_AGENT.to_string()),
        (StoryType::Unknown, ALWAYS_AVAILABLE_AGENT.to_string()),
    ])
}

#[cfg(test)]
#[path = "phases_tests.rs"]
mod tests;
