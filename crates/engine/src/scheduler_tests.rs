// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cascade_core::{Priority, Story};
use proptest::prelude::*;

fn story(id: &str, deps: &[&str]) -> Story {
    Story::builder()
        .id(id)
        .title(format!("story {id}"))
        .dependencies(deps.iter().map(|d| StoryId::new(*d)).collect())
        .build()
}

fn plan_with(stories: Vec<Story>) -> Plan {
    Plan {
        goal: "test".to_string(),
        stories,
        ..Plan::default()
    }
}

fn ids(batch: &[StoryId]) -> Vec<&str> {
    batch.iter().map(StoryId::as_str).collect()
}

#[test]
fn empty_plan_has_no_batches() {
    let plan = Plan::new("empty");
    let bp = batches(&plan);
    assert!(bp.batches.is_empty());
    assert!(!bp.has_cycle());
    assert_eq!(bp.story_count(), 0);
}

#[test]
fn diamond_produces_three_batches() {
    let plan = plan_with(vec![
        story("story-001", &[]),
        story("story-002", &["story-001"]),
        story("story-003", &["story-001"]),
        story("story-004", &["story-002", "story-003"]),
    ]);

    let bp = batches(&plan);
    assert!(!bp.has_cycle());
    assert_eq!(bp.batches.len(), 3);
    assert_eq!(ids(&bp.batches[0]), vec!["story-001"]);
    assert_eq!(ids(&bp.batches[1]), vec!["story-002", "story-003"]);
    assert_eq!(ids(&bp.batches[2]), vec!["story-004"]);
}

#[test]
fn priority_breaks_ties_within_a_batch() {
    let mut low = story("story-low", &[]);
    low.priority = Priority::Low;
    let mut high = story("story-high", &[]);
    high.priority = Priority::High;
    let medium = story("story-medium", &[]);

    let plan = plan_with(vec![low, medium, high]);
    let bp = batches(&plan);
    assert_eq!(
        ids(&bp.batches[0]),
        vec!["story-high", "story-medium", "story-low"]
    );
}

#[test]
fn equal_priority_keeps_plan_order() {
    let plan = plan_with(vec![
        story("story-b", &[]),
        story("story-a", &[]),
        story("story-c", &[]),
    ]);
    let bp = batches(&plan);
    assert_eq!(ids(&bp.batches[0]), vec!["story-b", "story-a", "story-c"]);
}

#[test]
fn completed_stories_satisfy_dependencies_but_never_reappear() {
    let mut base = story("story-001", &[]);
    base.status = StoryStatus::Complete;
    let plan = plan_with(vec![base, story("story-002", &["story-001"])]);

    let bp = batches(&plan);
    assert_eq!(bp.batches.len(), 1);
    assert_eq!(ids(&bp.batches[0]), vec!["story-002"]);
}

#[test]
fn cycle_surfaces_as_cycle_break_batch() {
    let plan = plan_with(vec![
        story("story-001", &[]),
        story("story-002", &["story-003"]),
        story("story-003", &["story-002"]),
    ]);

    let bp = batches(&plan);
    assert_eq!(bp.batches.len(), 1);
    assert_eq!(ids(&bp.batches[0]), vec!["story-001"]);
    assert!(bp.has_cycle());
    let mut cycle = ids(&bp.cycle);
    cycle.sort_unstable();
    assert_eq!(cycle, vec!["story-002", "story-003"]);
}

#[test]
fn unknown_dependencies_do_not_block_scheduling() {
    let plan = plan_with(vec![story("story-001", &["story-phantom"])]);
    let bp = batches(&plan);
    assert_eq!(bp.batches.len(), 1);
    assert!(!bp.has_cycle());
}

#[test]
fn next_ready_uses_completed_snapshot() {
    let plan = plan_with(vec![
        story("story-001", &[]),
        story("story-002", &["story-001"]),
    ]);

    let none: std::collections::HashSet<StoryId> = Default::default();
    let ready: Vec<&str> = next_ready(&plan, &none).iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ready, vec!["story-001"]);

    let done: std::collections::HashSet<StoryId> =
        [StoryId::new("story-001")].into_iter().collect();
    let ready: Vec<&str> = next_ready(&plan, &done).iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ready, vec!["story-001", "story-002"]);
}

#[test]
fn dependents_are_transitive() {
    let plan = plan_with(vec![
        story("story-001", &[]),
        story("story-002", &["story-001"]),
        story("story-003", &["story-002"]),
        story("story-004", &[]),
    ]);

    let deps = dependents_of(&plan, "story-001");
    assert_eq!(deps.len(), 2);
    assert!(deps.contains(&StoryId::new("story-002")));
    assert!(deps.contains(&StoryId::new("story-003")));
}

/// Arbitrary acyclic plans: each story may only depend on earlier ones.
fn acyclic_plan() -> impl Strategy<Value = Plan> {
    (1usize..12).prop_flat_map(|n| {
        let deps = proptest::collection::vec(proptest::collection::vec(0usize..n.max(1), 0..3), n);
        deps.prop_map(move |dep_lists| {
            let stories: Vec<Story> = dep_lists
                .iter()
                .enumerate()
                .map(|(i, deps)| {
                    let mut uniq: Vec<StoryId> = deps
                        .iter()
                        .filter(|d| **d < i)
                        .map(|d| StoryId::new(format!("story-{d:03}")))
                        .collect();
                    uniq.dedup();
                    Story::builder()
                        .id(format!("story-{i:03}"))
                        .title(format!("story {i}"))
                        .dependencies(uniq)
                        .build()
                })
                .collect();
            plan_with(stories)
        })
    })
}

proptest! {
    #[test]
    fn batches_respect_dependencies(plan in acyclic_plan()) {
        let bp = batches(&plan);
        prop_assert!(!bp.has_cycle());

        // Every story appears in exactly one batch
        prop_assert_eq!(bp.story_count(), plan.stories.len());
        let mut seen = std::collections::HashSet::new();
        for batch in &bp.batches {
            for id in batch {
                prop_assert!(seen.insert(id.clone()));
            }
        }

        // A story's dependencies always land in an earlier batch
        let batch_of = |id: &str| -> usize {
            bp.batches
                .iter()
                .position(|b| b.iter().any(|s| s == id))
                .unwrap_or(usize::MAX)
        };
        for story in &plan.stories {
            for dep in &story.dependencies {
                prop_assert!(batch_of(dep.as_str()) < batch_of(story.id.as_str()));
            }
        }
    }
}
