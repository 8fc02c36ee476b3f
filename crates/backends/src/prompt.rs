// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Story prompt construction shared by every backend.

use cascade_core::Story;

/// Render the prompt handed to an agent for one story.
///
/// Includes the numbered acceptance criteria and the marker protocol so
/// any backend's output can be scanned for completion.
pub fn build_story_prompt(story: &Story) -> String {
    let mut prompt = format!("# Story: {}\n\n{}\n", story.title, story.description);

    if !story.acceptance_criteria.is_empty() {
        prompt.push_str("\n## Acceptance Criteria\n");
        for (i, criterion) in story.acceptance_criteria.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, criterion));
        }
    }

    if !story.dependencies.is_empty() {
        prompt.push_str("\n## Completed Dependencies\n");
        for dep in &story.dependencies {
            prompt.push_str(&format!("- {dep}\n"));
        }
    }

    prompt.push_str(
        "\nImplement this story completely. \
         When every acceptance criterion is met, output \"TASK_COMPLETE\" on its own line. \
         If the story cannot be completed, output \"TASK_FAILED: <reason>\".\n",
    );
    prompt
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
