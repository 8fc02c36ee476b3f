// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S5 — cycle detection: the validator names both members and the
//! scheduler surfaces them as a flagged cycle-break batch.

use crate::prelude::*;
use cascade_core::{PlanError, StoryId};
use cascade_engine::batches;

#[test]
fn declared_cycle_is_surfaced_not_executed() {
    let plan = plan_with(vec![
        story("story-001", &[]),
        story("story-002", &["story-003"]),
        story("story-003", &["story-002"]),
    ]);

    // validate() names both stories
    let errors = plan.validate();
    assert!(!errors.is_empty());
    let cycle = errors
        .iter()
        .find_map(|e| match e {
            PlanError::Cycle(members) => Some(members.clone()),
            _ => None,
        })
        .expect("cycle error");
    assert!(cycle.contains(&StoryId::new("story-002")));
    assert!(cycle.contains(&StoryId::new("story-003")));

    // batches() flags the cycle instead of raising
    let bp = batches(&plan);
    assert!(bp.has_cycle());
    assert_eq!(bp.cycle.len(), 2);
    assert_eq!(bp.batches.len(), 1);
    assert_eq!(bp.batches[0], vec![StoryId::new("story-001")]);
}
