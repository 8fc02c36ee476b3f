// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry bookkeeping and relaunch eligibility.
//!
//! Failure records accumulate per story; once the attempt counter passes
//! `max_attempts` the story is abandoned. Agent escalation for the next
//! attempt is delegated to the phase chain's retry configuration.

use cascade_core::{time_fmt, Clock, ErrorType, FailureRecord, RetryState, StoryId};
use std::collections::HashMap;

/// Default maximum retry attempts per story.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

pub struct RetryManager<C: Clock> {
    max_attempts: u32,
    states: HashMap<StoryId, RetryState>,
    clock: C,
}

impl<C: Clock> RetryManager<C> {
    pub fn new(clock: C) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            states: HashMap::new(),
            clock,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Record one failure; returns the new attempt count.
    pub fn record_failure(
        &mut self,
        story_id: &StoryId,
        agent: &str,
        error_type: ErrorType,
        error_excerpt: &str,
    ) -> u32 {
        let record = FailureRecord {
            agent: agent.to_string(),
            error_type,
            error_excerpt: error_excerpt.to_string(),
            timestamp: time_fmt::format_utc(self.clock.epoch_ms()),
        };
        let state = self.states.entry(story_id.clone()).or_default();
        let count = state.record(record);
        tracing::info!(
            story_id = %story_id,
            agent,
            error_type = %error_type,
            attempt = count,
            "recorded failure"
        );
        count
    }

    /// A story may retry while its counter has not passed the cap.
    pub fn can_retry(&self, story_id: &str) -> bool {
        self.attempt_count(story_id) <= self.max_attempts
    }

    /// A story is abandoned once it exhausted its attempts.
    pub fn is_abandoned(&self, story_id: &str) -> bool {
        self.attempt_count(story_id) > self.max_attempts
    }

    pub fn attempt_count(&self, story_id: &str) -> u32 {
        self.states
            .get(story_id)
            .map(|s| s.attempt_count)
            .unwrap_or(0)
    }

    /// The agent that ran the most recent failed attempt.
    pub fn last_agent(&self, story_id: &str) -> Option<&str> {
        self.states
            .get(story_id)
            .and_then(|s| s.last_agent.as_deref())
    }

    pub fn state(&self, story_id: &str) -> Option<&RetryState> {
        self.states.get(story_id)
    }

    /// Classify a supervisor error string into an [`ErrorType`].
    pub fn classify_error(error: &str) -> ErrorType {
        if error.starts_with("Timeout after") {
            ErrorType::Timeout
        } else if error.starts_with("Exit code") {
            ErrorType::ExitCode
        } else if error.contains("exited unexpectedly") {
            ErrorType::ProcessCrash
        } else if error.contains("gate") {
            ErrorType::QualityGate
        } else {
            ErrorType::Unknown
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
