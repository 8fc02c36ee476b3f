// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cascade_llm::{Completion, LlmError, ScriptedProvider};
use tempfile::TempDir;

#[test]
fn short_simple_task_is_direct() {
    let decision = analyze_heuristic("fix typo in readme");
    assert_eq!(decision.strategy, ExecutionStrategy::Direct);
    assert_eq!(decision.estimated_stories, 1);
    assert!(!decision.use_worktree);
    assert!(decision.confidence <= 0.9);
}

#[test]
fn feature_task_is_hybrid() {
    let decision = analyze_heuristic(
        "implement authentication with an api integration and database-backed sessions",
    );
    assert_eq!(decision.strategy, ExecutionStrategy::HybridAuto);
    assert!(decision.estimated_stories >= 2);
}

#[test]
fn platform_rebuild_is_mega() {
    let decision = analyze_heuristic(
        "rewrite the entire platform architecture as a comprehensive end to end system \
         with multiple features spanning microservices",
    );
    assert_eq!(decision.strategy, ExecutionStrategy::MegaPlan);
    assert!(decision.use_worktree);
    assert!(decision.estimated_features >= 2);
    assert_eq!(
        decision.estimated_stories,
        decision.estimated_features * 3
    );
}

#[test]
fn worktree_keywords_set_the_flag() {
    let decision = analyze_heuristic("quick experimental tweak, prototype only");
    assert!(decision.use_worktree);
}

#[test]
fn confidence_is_capped() {
    let decision = analyze_heuristic(
        "rewrite migrate overhaul entire comprehensive platform system architecture \
         microservices full stack end to end",
    );
    assert!(decision.confidence <= 0.9);
}

#[test]
fn override_has_full_confidence() {
    let decision = override_strategy(ExecutionStrategy::MegaPlan, true);
    assert_eq!(decision.confidence, 1.0);
    assert_eq!(decision.reasoning, "User override: mega_plan");
    assert!(decision.use_worktree);
}

#[test]
fn parse_decision_extracts_embedded_json() {
    let content = r#"Here is my analysis:
{"strategy": "hybrid_auto", "use_worktree": false, "estimated_stories": 4,
 "confidence": 0.8, "reasoning": "medium feature"}
Hope that helps!"#;
    let decision = parse_decision(content).unwrap();
    assert_eq!(decision.strategy, ExecutionStrategy::HybridAuto);
    assert_eq!(decision.estimated_stories, 4);
    assert_eq!(decision.estimated_features, 1);
}

#[test]
fn parse_decision_rejects_non_json() {
    assert!(parse_decision("no json here").is_none());
    assert!(parse_decision("{broken").is_none());
}

#[tokio::test]
async fn llm_path_parses_response() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::completions(vec![Completion::text(
        r#"{"strategy": "direct", "use_worktree": false, "estimated_stories": 1,
            "confidence": 0.95, "reasoning": "tiny"}"#,
    )]));
    let analyzer = StrategyAnalyzer::new(Some(provider));

    let decision = analyzer.analyze("fix typo", dir.path()).await.unwrap();
    assert_eq!(decision.strategy, ExecutionStrategy::Direct);
    assert_eq!(decision.confidence, 0.95);
}

#[tokio::test]
async fn llm_failure_falls_back_to_heuristic() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Err(LlmError::RateLimit)]));
    let analyzer = StrategyAnalyzer::new(Some(provider));

    let decision = analyzer.analyze("fix typo in readme", dir.path()).await.unwrap();
    assert_eq!(decision.strategy, ExecutionStrategy::Direct);
}

#[tokio::test]
async fn llm_failure_without_fallback_is_an_error() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Err(LlmError::Authentication)]));
    let analyzer = StrategyAnalyzer::new(Some(provider)).with_fallback(false);

    assert!(analyzer.analyze("fix typo", dir.path()).await.is_err());
}

#[tokio::test]
async fn no_provider_uses_heuristic() {
    let dir = TempDir::new().unwrap();
    let analyzer = StrategyAnalyzer::new(None);
    let decision = analyzer.analyze("fix typo in readme", dir.path()).await.unwrap();
    assert_eq!(decision.strategy, ExecutionStrategy::Direct);
}
