// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-batched scheduling.
//!
//! A batch is the maximal set of incomplete stories whose dependencies
//! are satisfied by completed stories or earlier batches. Batches are
//! the unit of concurrent dispatch; nothing in batch `k+1` starts before
//! batch `k` is terminal.

use cascade_core::{Plan, Story, StoryId, StoryStatus};
use std::collections::HashSet;

/// The computed batch sequence.
///
/// When no progress is possible and stories remain, the remainder is
/// surfaced as a single `cycle` batch instead of an error; the caller
/// decides whether to refuse execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    pub batches: Vec<Vec<StoryId>>,
    pub cycle: Vec<StoryId>,
}

impl BatchPlan {
    pub fn has_cycle(&self) -> bool {
        !self.cycle.is_empty()
    }

    /// Total stories across normal batches and the cycle batch.
    pub fn story_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum::<usize>() + self.cycle.len()
    }
}

/// Compute the batch sequence for a plan.
///
/// Completed stories satisfy dependencies but never reappear in a
/// batch. Within a batch the order is priority (`high > medium > low`),
/// stable on plan order for ties. O(V+E) per sweep.
pub fn batches(plan: &Plan) -> BatchPlan {
    let mut satisfied: HashSet<&str> = plan
        .stories
        .iter()
        .filter(|s| s.status == StoryStatus::Complete)
        .map(|s| s.id.as_str())
        .collect();

    let known: HashSet<&str> = plan.stories.iter().map(|s| s.id.as_str()).collect();
    let mut remaining: Vec<&Story> = plan
        .stories
        .iter()
        .filter(|s| s.status != StoryStatus::Complete)
        .collect();

    let mut result = BatchPlan::default();
    while !remaining.is_empty() {
        let mut ready: Vec<&Story> = remaining
            .iter()
            .copied()
            .filter(|s| {
                s.dependencies
                    .iter()
                    // Unknown dependencies are a validation error, not a
                    // scheduling blocker.
                    .all(|d| satisfied.contains(d.as_str()) || !known.contains(d.as_str()))
            })
            .collect();

        if ready.is_empty() {
            // Remainder cannot progress: cycle-break batch.
            result.cycle = remaining.iter().map(|s| s.id.clone()).collect();
            return result;
        }

        // Stable sort keeps plan order within equal priority.
        ready.sort_by_key(|s| s.priority.rank());

        for story in &ready {
            satisfied.insert(story.id.as_str());
        }
        let ready_ids: HashSet<&str> = ready.iter().map(|s| s.id.as_str()).collect();
        remaining.retain(|s| !ready_ids.contains(s.id.as_str()));
        result.batches.push(ready.iter().map(|s| s.id.clone()).collect());
    }

    result
}

/// Stories ready to start right now, given a completed-set snapshot.
pub fn next_ready<'a>(plan: &'a Plan, completed: &HashSet<StoryId>) -> Vec<&'a Story> {
    let known: HashSet<&str> = plan.stories.iter().map(|s| s.id.as_str()).collect();
    let mut ready: Vec<&Story> = plan
        .stories
        .iter()
        .filter(|s| s.status == StoryStatus::Pending)
        .filter(|s| {
            s.dependencies.iter().all(|d| {
                completed.contains(d)
                    || !known.contains(d.as_str())
                    || plan
                        .get(d.as_str())
                        .is_some_and(|dep| dep.status == StoryStatus::Complete)
            })
        })
        .collect();
    ready.sort_by_key(|s| s.priority.rank());
    ready
}

/// Transitive dependents of a story (everything that cannot run until it
/// completes).
pub fn dependents_of(plan: &Plan, story_id: &str) -> HashSet<StoryId> {
    let mut result: HashSet<StoryId> = HashSet::new();
    let mut frontier = vec![story_id.to_string()];
    while let Some(current) = frontier.pop() {
        for story in &plan.stories {
            if story.dependencies.iter().any(|d| d == current.as_str())
                && result.insert(story.id.clone())
            {
                frontier.push(story.id.to_string());
            }
        }
    }
    result
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
