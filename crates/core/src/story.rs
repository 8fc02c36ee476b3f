// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Story identifier, priority, status, and the story record itself.
//!
//! A story is the node of the plan DAG: a unit of work with acceptance
//! criteria and dependencies on other stories.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a story within a plan.
///
/// Typically formatted as `story-NNN` but the format is opaque to
/// consumers; uniqueness per plan is the only requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(pub String);

impl StoryId {
    /// Create a new StoryId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this StoryId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for StoryId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StoryId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for StoryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Scheduling priority; ties within a batch are broken `high > medium > low`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort key: lower sorts first within a batch.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

crate::simple_display! {
    Priority {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

/// Story lifecycle status.
///
/// `Complete` is terminal and may never regress; the plan-level setter
/// enforces this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl StoryStatus {
    /// Terminal means no further scheduling for this story.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StoryStatus::Complete | StoryStatus::Failed)
    }
}

crate::simple_display! {
    StoryStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Complete => "complete",
        Failed => "failed",
    }
}

/// A unit of work in the plan DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: StoryStatus,
    #[serde(default)]
    pub dependencies: Vec<StoryId>,
    /// Preferred backend for this story, if the plan pins one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Story {
    /// Create a minimal pending story.
    pub fn new(id: impl Into<StoryId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            priority: Priority::default(),
            status: StoryStatus::default(),
            dependencies: Vec::new(),
            agent: None,
            tags: Vec::new(),
        }
    }

    /// All text fields that participate in story-type keyword inference.
    pub fn classification_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len() + self.description.len() + self.tags.iter().map(String::len).sum::<usize>() + 8,
        );
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.description);
        for tag in &self.tags {
            text.push(' ');
            text.push_str(tag);
        }
        text.to_lowercase()
    }
}

crate::builder! {
    pub struct StoryBuilder => Story {
        into {
            id: StoryId = "story-001",
            title: String = "test story",
            description: String = "",
        }
        set {
            acceptance_criteria: Vec<String> = Vec::new(),
            priority: Priority = Priority::Medium,
            status: StoryStatus = StoryStatus::Pending,
            dependencies: Vec<StoryId> = Vec::new(),
            tags: Vec<String> = Vec::new(),
        }
        option {
            agent: String = None,
        }
    }
}

#[cfg(test)]
#[path = "story_tests.rs"]
mod tests;
