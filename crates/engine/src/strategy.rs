// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task strategy classification.
//!
//! The primary path asks the LLM to classify a task description against
//! a short project digest and parses a JSON object out of the response.
//! When no provider is configured (or the call fails with fallback
//! enabled) a keyword heuristic decides instead — that path always
//! succeeds.

use crate::EngineError;
use cascade_llm::{ChatMessage, CompletionRequest, Provider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// How a task should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    Direct,
    HybridAuto,
    MegaPlan,
}

cascade_core::simple_display! {
    ExecutionStrategy {
        Direct => "direct",
        HybridAuto => "hybrid_auto",
        MegaPlan => "mega_plan",
    }
}

/// The analyzer's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: ExecutionStrategy,
    pub use_worktree: bool,
    pub estimated_stories: u32,
    #[serde(default = "default_features")]
    pub estimated_features: u32,
    #[serde(default)]
    pub estimated_duration_hours: f64,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub complexity_indicators: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

fn default_features() -> u32 {
    1
}

/// Replace the analyzer's decision with the user's.
pub fn override_strategy(strategy: ExecutionStrategy, use_worktree: bool) -> StrategyDecision {
    StrategyDecision {
        strategy,
        use_worktree,
        estimated_stories: 1,
        estimated_features: 1,
        estimated_duration_hours: 0.0,
        confidence: 1.0,
        reasoning: format!("User override: {strategy}"),
        complexity_indicators: Vec::new(),
        recommendations: Vec::new(),
    }
}

const ANALYSIS_PROMPT: &str = "Analyze the following development task and determine the best \
execution strategy.\n\n\
## Task Description\n{description}\n\n\
## Project Context\n{context}\n\n\
## Strategy Options\n\
1. direct: simple single-file changes\n\
2. hybrid_auto: medium-complexity features executed as a story DAG\n\
3. mega_plan: large multi-feature projects\n\n\
Return ONLY a JSON object with keys: strategy, use_worktree, \
estimated_stories, estimated_features, estimated_duration_hours, \
confidence, reasoning, complexity_indicators, recommendations.";

pub struct StrategyAnalyzer {
    provider: Option<Arc<dyn Provider>>,
    fallback_enabled: bool,
}

impl StrategyAnalyzer {
    pub fn new(provider: Option<Arc<dyn Provider>>) -> Self {
        Self {
            provider,
            fallback_enabled: true,
        }
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Classify a task description.
    pub async fn analyze(
        &self,
        description: &str,
        project_root: &Path,
    ) -> Result<StrategyDecision, EngineError> {
        if let Some(provider) = &self.provider {
            match self.analyze_with_llm(provider, description, project_root).await {
                Ok(decision) => return Ok(decision),
                Err(e) if self.fallback_enabled => {
                    tracing::warn!(error = %e, "strategy LLM failed, using heuristic");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(analyze_heuristic(description))
    }

    async fn analyze_with_llm(
        &self,
        provider: &Arc<dyn Provider>,
        description: &str,
        project_root: &Path,
    ) -> Result<StrategyDecision, EngineError> {
        let context = gather_context(project_root);
        let prompt = ANALYSIS_PROMPT
            .replace("{description}", description)
            .replace("{context}", &context);

        let completion = provider
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user(prompt)],
                tools: Vec::new(),
                tool_choice: None,
                temperature: 0.3,
                max_tokens: 1024,
            })
            .await?;

        parse_decision(&completion.content).ok_or_else(|| {
            EngineError::Llm(cascade_llm::LlmError::Generic(
                "no JSON decision in strategy response".to_string(),
            ))
        })
    }
}

/// Extract and parse the first JSON object in a response.
fn parse_decision(content: &str) -> Option<StrategyDecision> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

/// Short digest of the project: kinds, plan presence, README excerpt,
/// source-file counts.
fn gather_context(root: &Path) -> String {
    let mut parts = Vec::new();

    let kinds: Vec<&str> = [
        ("package.json", "node"),
        ("pyproject.toml", "python"),
        ("requirements.txt", "python"),
        ("Cargo.toml", "rust"),
        ("go.mod", "go"),
    ]
    .iter()
    .filter(|(file, _)| root.join(file).is_file())
    .map(|(_, kind)| *kind)
    .collect();
    if !kinds.is_empty() {
        parts.push(format!("Project kinds: {}", kinds.join(", ")));
    }

    if root.join("prd.json").is_file() {
        parts.push("Existing plan: prd.json".to_string());
    }
    if root.join("mega-plan.json").is_file() {
        parts.push("Existing plan: mega-plan.json".to_string());
    }

    for readme in ["README.md", "README.rst", "README.txt"] {
        if let Ok(content) = std::fs::read_to_string(root.join(readme)) {
            let excerpt: String = content.chars().take(500).collect();
            parts.push(format!("README excerpt:\n{excerpt}"));
            break;
        }
    }

    let source_count = count_source_files(root);
    parts.push(format!("Source files (top level): {source_count}"));

    parts.join("\n")
}

fn count_source_files(root: &Path) -> usize {
    const SOURCE_EXTS: &[&str] = &["rs", "py", "ts", "tsx", "js", "jsx", "go", "java", "rb"];
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SOURCE_EXTS.contains(&ext))
        })
        .count()
}

const MEGA_KEYWORDS: &[&str] = &[
    "platform",
    "system",
    "architecture",
    "multiple features",
    "microservices",
    "complete solution",
    "full stack",
    "end to end",
    "e2e",
    "entire",
    "comprehensive",
    "rewrite",
    "migrate",
    "overhaul",
];

const HYBRID_KEYWORDS: &[&str] = &[
    "implement",
    "create",
    "build",
    "develop",
    "add feature",
    "integration",
    "api",
    "authentication",
    "database",
    "workflow",
    "process",
    "multi-step",
    "component",
];

const DIRECT_KEYWORDS: &[&str] = &[
    "fix bug",
    "fix typo",
    "update",
    "modify",
    "change",
    "tweak",
    "simple",
    "minor",
    "small",
    "quick",
    "single file",
    "rename",
];

const WORKTREE_KEYWORDS: &[&str] = &[
    "experimental",
    "prototype",
    "isolation",
    "parallel",
    "don't affect",
    "without breaking",
    "test separately",
];

fn keyword_score(text: &str, keywords: &[&str]) -> u32 {
    keywords.iter().filter(|kw| text.contains(*kw)).count() as u32
}

/// Rule-based classification; always succeeds.
pub fn analyze_heuristic(description: &str) -> StrategyDecision {
    let lower = description.to_lowercase();
    let word_count = description.split_whitespace().count();
    let mut indicators = Vec::new();
    let mut recommendations = Vec::new();

    let mut mega_score = keyword_score(&lower, MEGA_KEYWORDS);
    let mut hybrid_score = keyword_score(&lower, HYBRID_KEYWORDS);
    let mut direct_score = keyword_score(&lower, DIRECT_KEYWORDS);
    let worktree_score = keyword_score(&lower, WORKTREE_KEYWORDS);

    if word_count > 200 {
        mega_score += 2;
        indicators.push("Long description suggests complex project".to_string());
    } else if word_count > 100 {
        hybrid_score += 1;
        indicators.push("Medium description suggests multi-story task".to_string());
    } else if word_count < 30 {
        direct_score += 1;
        indicators.push("Short description suggests simple task".to_string());
    }

    let bullet_count = description.matches('-').count() + description.matches('*').count();
    let number_count = (0..10).filter(|i| description.contains(&format!("{i}."))).count();
    let list_count = (bullet_count + number_count) as u32;

    if list_count >= 5 {
        mega_score += 2;
        indicators.push(format!(
            "Found {list_count} list items suggesting multiple features"
        ));
    } else if list_count >= 3 {
        hybrid_score += 1;
        indicators.push(format!(
            "Found {list_count} list items suggesting multiple stories"
        ));
    }

    let (strategy, confidence, estimated_features, estimated_stories, reasoning) =
        if mega_score >= 3 && mega_score > hybrid_score {
            let features = if list_count > 0 {
                (list_count / 2).max(2)
            } else {
                mega_score.max(2)
            };
            recommendations.extend([
                "Consider breaking into independent features".to_string(),
                "Use worktrees for parallel development".to_string(),
                "Define feature dependencies carefully".to_string(),
            ]);
            (
                ExecutionStrategy::MegaPlan,
                confidence_for(mega_score),
                features,
                features * 3,
                "Task complexity and scope suggest multi-feature architecture",
            )
        } else if hybrid_score >= 2 || (word_count > 50 && direct_score < 2) {
            recommendations.extend([
                "Generate PRD with clear story dependencies".to_string(),
                "Consider quality gates between stories".to_string(),
            ]);
            (
                ExecutionStrategy::HybridAuto,
                confidence_for(hybrid_score),
                1,
                (hybrid_score + 1).max(2),
                "Task complexity suggests structured multi-story approach",
            )
        } else {
            recommendations.extend([
                "Execute task directly without PRD".to_string(),
                "Consider adding acceptance criteria".to_string(),
            ]);
            (
                ExecutionStrategy::Direct,
                confidence_for(direct_score),
                1,
                1,
                "Task appears simple enough for direct execution",
            )
        };

    let use_worktree = worktree_score > 0 || strategy == ExecutionStrategy::MegaPlan;
    let estimated_duration_hours = match strategy {
        ExecutionStrategy::MegaPlan => estimated_features as f64 * 4.0,
        ExecutionStrategy::HybridAuto => estimated_stories as f64,
        ExecutionStrategy::Direct => 0.5,
    };

    StrategyDecision {
        strategy,
        use_worktree,
        estimated_stories,
        estimated_features,
        estimated_duration_hours,
        confidence,
        reasoning: reasoning.to_string(),
        complexity_indicators: indicators,
        recommendations,
    }
}

fn confidence_for(score: u32) -> f64 {
    (0.5 + score as f64 * 0.1).min(0.9)
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
