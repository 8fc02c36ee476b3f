// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plan (PRD): an ordered set of stories forming a dependency DAG.

use crate::story::{Story, StoryId, StoryStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Validation failures for a plan. `validate` collects every violation
/// rather than stopping at the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("duplicate story id: {0}")]
    DuplicateId(StoryId),
    #[error("story {story} depends on unknown story {dependency}")]
    UnknownDependency { story: StoryId, dependency: StoryId },
    #[error("story {0} depends on itself")]
    SelfDependency(StoryId),
    #[error("dependency cycle involving stories: {}", .0.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<StoryId>),
}

/// A validated DAG of stories plus goal and metadata.
///
/// Serialized as `prd.json`; parse-write-parse is identity modulo key
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub stories: Vec<Story>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Plan {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// Look up a story by id.
    pub fn get(&self, id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == id)
    }

    /// Validate ids, dependency references, and acyclicity.
    ///
    /// Returns every violation found; an empty list means the plan is
    /// executable.
    pub fn validate(&self) -> Vec<PlanError> {
        let mut errors = Vec::new();

        let mut seen: HashSet<&str> = HashSet::new();
        for story in &self.stories {
            if !seen.insert(story.id.as_str()) {
                errors.push(PlanError::DuplicateId(story.id.clone()));
            }
        }

        let ids: HashSet<&str> = self.stories.iter().map(|s| s.id.as_str()).collect();
        for story in &self.stories {
            for dep in &story.dependencies {
                if dep == &story.id {
                    errors.push(PlanError::SelfDependency(story.id.clone()));
                } else if !ids.contains(dep.as_str()) {
                    errors.push(PlanError::UnknownDependency {
                        story: story.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            errors.push(PlanError::Cycle(cycle));
        }

        errors
    }

    /// Stories that are part of a dependency cycle, if any.
    ///
    /// Uses iterative Kahn elimination: whatever cannot be topologically
    /// ordered is cyclic. Unknown dependencies are ignored here (reported
    /// separately by `validate`).
    pub fn find_cycle(&self) -> Option<Vec<StoryId>> {
        let ids: HashSet<&str> = self.stories.iter().map(|s| s.id.as_str()).collect();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for story in &self.stories {
            let known_deps = story
                .dependencies
                .iter()
                .filter(|d| ids.contains(d.as_str()) && **d != story.id)
                .count();
            in_degree.insert(story.id.as_str(), known_deps);
            for dep in &story.dependencies {
                if ids.contains(dep.as_str()) && *dep != story.id {
                    dependents.entry(dep.as_str()).or_default().push(story.id.as_str());
                }
            }
        }

        let mut ready: Vec<&str> = self
            .stories
            .iter()
            .filter(|s| in_degree.get(s.id.as_str()) == Some(&0))
            .map(|s| s.id.as_str())
            .collect();
        let mut resolved = 0usize;

        while let Some(id) = ready.pop() {
            resolved += 1;
            if let Some(children) = dependents.get(id) {
                for child in children {
                    if let Some(deg) = in_degree.get_mut(child) {
                        *deg -= 1;
                        if *deg == 0 {
                            ready.push(child);
                        }
                    }
                }
            }
        }

        if resolved == self.stories.len() {
            return None;
        }

        let cyclic: Vec<StoryId> = self
            .stories
            .iter()
            .filter(|s| in_degree.get(s.id.as_str()).is_some_and(|d| *d > 0))
            .map(|s| s.id.clone())
            .collect();
        Some(cyclic)
    }

    /// Set a story's status, guarding the `Complete` terminal state.
    ///
    /// Returns false if the story is unknown or already complete with a
    /// different status requested.
    pub fn set_status(&mut self, id: &str, status: StoryStatus) -> bool {
        let Some(story) = self.stories.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        if story.status == StoryStatus::Complete && status != StoryStatus::Complete {
            return false;
        }
        story.status = status;
        true
    }

    /// Ids of stories whose status equals `status`.
    pub fn ids_with_status(&self, status: StoryStatus) -> Vec<StoryId> {
        self.stories
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.id.clone())
            .collect()
    }

    /// True when every story is terminal.
    pub fn is_drained(&self) -> bool {
        self.stories.iter().all(|s| s.status.is_terminal())
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
