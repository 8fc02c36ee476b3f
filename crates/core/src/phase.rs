// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution phases and story types used by agent selection.

use crate::story::Story;
use serde::{Deserialize, Serialize};

/// Phase of story processing; each phase carries its own agent defaults
/// and fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPhase {
    Planning,
    Implementation,
    Retry,
    Refactor,
    Review,
}

impl ExecutionPhase {
    pub const ALL: [ExecutionPhase; 5] = [
        ExecutionPhase::Planning,
        ExecutionPhase::Implementation,
        ExecutionPhase::Retry,
        ExecutionPhase::Refactor,
        ExecutionPhase::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPhase::Planning => "planning",
            ExecutionPhase::Implementation => "implementation",
            ExecutionPhase::Retry => "retry",
            ExecutionPhase::Refactor => "refactor",
            ExecutionPhase::Review => "review",
        }
    }
}

crate::simple_display! {
    ExecutionPhase {
        Planning => "planning",
        Implementation => "implementation",
        Retry => "retry",
        Refactor => "refactor",
        Review => "review",
    }
}

/// Story classification inferred from title, tags, and description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    Feature,
    Bugfix,
    Refactor,
    Test,
    Documentation,
    Infrastructure,
    Unknown,
}

impl StoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryType::Feature => "feature",
            StoryType::Bugfix => "bugfix",
            StoryType::Refactor => "refactor",
            StoryType::Test => "test",
            StoryType::Documentation => "documentation",
            StoryType::Infrastructure => "infrastructure",
            StoryType::Unknown => "unknown",
        }
    }

    /// Infer a story's type from keyword hits over its text fields.
    ///
    /// Categories are scored by hit count; the specific categories win
    /// over `Feature` on ties because feature verbs ("add", "build")
    /// appear in almost every story.
    pub fn infer(story: &Story) -> StoryType {
        let text = story.classification_text();

        const LEXICONS: [(StoryType, &[&str]); 6] = [
            (
                StoryType::Bugfix,
                &[
                    "fix", "bug", "error", "issue", "crash", "broken", "patch", "repair",
                    "resolve", "debug", "hotfix",
                ],
            ),
            (
                StoryType::Refactor,
                &[
                    "refactor", "restructure", "reorganize", "cleanup", "improve", "optimize",
                    "simplify", "modernize",
                ],
            ),
            (
                StoryType::Test,
                &[
                    "test", "spec", "unit test", "integration test", "e2e", "coverage",
                    "assertion", "mock",
                ],
            ),
            (
                StoryType::Documentation,
                &[
                    "doc", "readme", "documentation", "comment", "jsdoc", "docstring",
                    "api doc", "guide",
                ],
            ),
            (
                StoryType::Infrastructure,
                &[
                    "ci", "cd", "pipeline", "deploy", "docker", "kubernetes", "terraform",
                    "ansible", "devops", "infrastructure", "workflow",
                ],
            ),
            (
                StoryType::Feature,
                &[
                    "add", "create", "implement", "new", "feature", "introduce", "build",
                    "develop", "support",
                ],
            ),
        ];

        let mut best = StoryType::Unknown;
        let mut best_score = 0usize;
        for (story_type, keywords) in LEXICONS {
            let score = keywords.iter().filter(|kw| text.contains(*kw)).count();
            if score > best_score {
                best = story_type;
                best_score = score;
            }
        }
        best
    }
}

crate::simple_display! {
    StoryType {
        Feature => "feature",
        Bugfix => "bugfix",
        Refactor => "refactor",
        Test => "test",
        Documentation => "documentation",
        Infrastructure => "infrastructure",
        Unknown => "unknown",
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
