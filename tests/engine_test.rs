//! End-to-end tests for the Tree-of-Thoughts engine.
//!
//! Runs the full start → explore → select → synthesize flow with the
//! deterministic heuristics, plus mocked generators for degraded paths.

use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use tot_reasoning::error::{GeneratorError, ReasoningError};
use tot_reasoning::tot::{
    ExplorerSettings, HeuristicEvaluator, RunOptions, SearchStrategy, ThoughtGenerator, TotConfig,
    TreeOfThoughts, DEGRADED_SOLUTION,
};

const PROBLEM: &str = "Plan a product launch";

mock! {
    pub Generator {}

    #[async_trait]
    impl ThoughtGenerator for Generator {
        async fn generate(
            &self,
            parent_content: &str,
            problem: &str,
            depth: usize,
            max_thoughts: usize,
        ) -> Result<Vec<String>, GeneratorError>;

        fn name(&self) -> &str;
    }
}

fn engine_with(generator: MockGenerator) -> TreeOfThoughts {
    TreeOfThoughts::new(
        Arc::new(generator),
        Arc::new(HeuristicEvaluator::new()),
        ExplorerSettings::default(),
    )
}

// ============================================================================
// Scenario A: default heuristic run
// ============================================================================

#[tokio::test]
async fn test_product_launch_default_run() {
    let engine = TreeOfThoughts::heuristic();
    let response = engine.generate_response("a", PROBLEM, None).await.unwrap();
    let session = engine.get_session("a").await.unwrap();

    let root = session.root();
    assert_eq!(root.children.len(), 3);
    for child_id in &root.children {
        let child = session.node(child_id).unwrap();
        assert_eq!(child.depth, 1);
        assert!(child.children.len() <= 3);
    }

    assert!((0.0..=1.0).contains(&response.confidence));
    assert!(response.primary_response.contains("final recommendation"));
    assert!(response.primary_response.starts_with("Solution for: Plan a product launch"));
    assert!(session.is_complete);
    assert_eq!(response.response_type, "tree-of-thoughts");
    assert!(response
        .metadata
        .resources_used
        .contains(&"heuristic-generator".to_string()));
}

#[tokio::test]
async fn test_reasoning_trail_starts_at_root() {
    let engine = TreeOfThoughts::heuristic();
    let response = engine.generate_response("trail", PROBLEM, None).await.unwrap();

    let first = &response.reasoning_process[0];
    assert_eq!(first.step, 1);
    assert_eq!(first.node_id, "node-0");
    assert_eq!(first.parent_content, "Problem: Plan a product launch");
    assert_eq!(first.children_created, 3);
    for (index, step) in response.reasoning_process.iter().enumerate() {
        assert_eq!(step.step, index + 1);
    }
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let engine = TreeOfThoughts::heuristic();
    let first = engine.generate_response("d1", PROBLEM, None).await.unwrap();
    let second = engine.generate_response("d2", PROBLEM, None).await.unwrap();

    assert_eq!(first.primary_response, second.primary_response);
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.alternatives, second.alternatives);
    assert_eq!(first.reasoning_process, second.reasoning_process);
}

// ============================================================================
// Scenario B: generator produces nothing
// ============================================================================

#[tokio::test]
async fn test_empty_generator_degrades_to_root_only() {
    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .times(1)
        .returning(|_, _, _, _| Ok(Vec::new()));
    generator.expect_name().return_const("mock-generator".to_string());

    let engine = engine_with(generator);
    let response = engine.generate_response("b", PROBLEM, None).await.unwrap();
    let session = engine.get_session("b").await.unwrap();

    assert_eq!(session.selected_path, vec!["node-0".to_string()]);
    assert_eq!(response.primary_response, DEGRADED_SOLUTION);
    assert_eq!(response.confidence, 0.0);
    assert!(response.alternatives.is_empty());
}

#[tokio::test]
async fn test_failing_generator_degrades_with_note() {
    let mut generator = MockGenerator::new();
    generator.expect_generate().returning(|_, _, _, _| {
        Err(GeneratorError::Failed {
            message: "model offline".to_string(),
        })
    });
    generator.expect_name().return_const("mock-generator".to_string());

    let engine = engine_with(generator);
    let response = engine.generate_response("fail", PROBLEM, None).await.unwrap();

    assert_eq!(response.primary_response, DEGRADED_SOLUTION);
    assert_eq!(response.confidence, 0.0);
    let note = response.reasoning_process[0].note.as_deref().unwrap();
    assert!(note.contains("model offline"));
}

#[tokio::test]
async fn test_generator_receives_branching_factor_and_depth() {
    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .withf(|parent, problem, depth, max| {
            parent == "Problem: Plan a product launch" && problem == PROBLEM && *depth == 0 && *max == 2
        })
        .times(1)
        .returning(|_, _, _, _| Ok(vec!["only".to_string(), "only".to_string()]));
    generator
        .expect_generate()
        .returning(|_, _, _, _| Ok(Vec::new()));
    generator.expect_name().return_const("mock-generator".to_string());

    let engine = engine_with(generator);
    let config = TotConfig::default().with_branching_factor(2);
    engine.generate_response("args", PROBLEM, Some(config)).await.unwrap();

    // Duplicate thoughts collapse into one child.
    let session = engine.get_session("args").await.unwrap();
    assert_eq!(session.root().children.len(), 1);
}

// ============================================================================
// Scenario C: aggressive pruning
// ============================================================================

#[tokio::test]
async fn test_high_threshold_expands_only_root() {
    let engine = TreeOfThoughts::heuristic();
    let config = TotConfig::default().with_pruning_threshold(0.9);
    engine.generate_response("c", PROBLEM, Some(config)).await.unwrap();

    let session = engine.get_session("c").await.unwrap();
    let expanded: Vec<&str> = session
        .nodes
        .values()
        .filter(|n| n.is_expanded)
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(expanded, vec!["node-0"]);
    assert!(session.total_nodes() <= 1 + config.branching_factor);
    assert_eq!(session.reasoning_steps.len(), 1);
}

// ============================================================================
// Scenario D: session reset
// ============================================================================

#[tokio::test]
async fn test_restarting_session_discards_tree() {
    let engine = TreeOfThoughts::heuristic();
    engine.generate_response("d", PROBLEM, None).await.unwrap();
    assert!(engine.get_session("d").await.unwrap().total_nodes() > 1);

    let session = engine.start_session("d", PROBLEM, None).unwrap();
    assert_eq!(session.total_nodes(), 1);
    assert_eq!(engine.get_session("d").await.unwrap().total_nodes(), 1);
    assert!(engine.get_session("d").await.unwrap().reasoning_steps.is_empty());
}

// ============================================================================
// Tree invariants
// ============================================================================

#[tokio::test]
async fn test_tree_invariants_for_every_strategy() {
    for strategy in [
        SearchStrategy::BreadthFirst,
        SearchStrategy::DepthFirst,
        SearchStrategy::BestFirst,
    ] {
        let engine = TreeOfThoughts::heuristic();
        let config = TotConfig::default().with_strategy(strategy);
        engine.generate_response("inv", PROBLEM, Some(config)).await.unwrap();
        let session = engine.get_session("inv").await.unwrap();

        assert!(session.explored_count <= 50, "{}", strategy);
        for node in session.nodes.values() {
            assert!((0.0..=1.0).contains(&node.value));
            assert!(node.depth <= config.max_depth);
            if let Some(parent_id) = &node.parent_id {
                assert_eq!(node.depth, session.node(parent_id).unwrap().depth + 1);
            }
        }

        let path = &session.selected_path;
        assert_eq!(path.first().map(String::as_str), Some("node-0"));
        assert!(session.node(path.last().unwrap()).unwrap().is_leaf());
        for id in path {
            assert!(session.node(id).unwrap().is_selected);
        }
    }
}

#[tokio::test]
async fn test_visualization_matches_session() {
    let engine = TreeOfThoughts::heuristic();
    engine.generate_response("viz", PROBLEM, None).await.unwrap();

    let view = engine.get_tree_visualization("viz").await.unwrap();
    let session = engine.get_session("viz").await.unwrap();

    assert_eq!(view.total_nodes, session.nodes.len());
    assert_eq!(view.selected_path, session.selected_path);
    assert_eq!(view.tree.id, "node-0");
    assert_eq!(view.tree.children.len(), session.root().children.len());
    assert!(view.is_complete);
}

#[tokio::test]
async fn test_reevaluation_is_stable() {
    let engine = TreeOfThoughts::heuristic();
    engine.generate_response("eval", PROBLEM, None).await.unwrap();
    let ids = engine.get_session("eval").await.unwrap().root().children.clone();

    let first = engine.evaluate_nodes("eval", &ids).await.unwrap();
    let second = engine.evaluate_nodes("eval", &ids).await.unwrap();

    let values = |evals: &[tot_reasoning::tot::Evaluation]| evals.iter().map(|e| e.value).collect::<Vec<_>>();
    assert_eq!(values(&first), values(&second));
}

// ============================================================================
// Manual operations
// ============================================================================

#[tokio::test]
async fn test_manual_expand_and_select() {
    let engine = TreeOfThoughts::heuristic();
    engine
        .start_session("m", PROBLEM, Some(TotConfig::default().with_max_depth(1)))
        .unwrap();

    let children = engine.expand_node("m", "node-0").await.unwrap();
    assert_eq!(children, vec!["node-1", "node-2", "node-3"]);

    // Children sit at max depth and cannot grow.
    assert!(engine.expand_node("m", "node-1").await.unwrap().is_empty());

    let again = engine.expand_node("m", "node-0").await.unwrap();
    assert_eq!(again, children);

    let path = engine.select_best_path("m").await.unwrap();
    assert_eq!(path.len(), 2);
    assert!(children.contains(&path[1]));
}

#[tokio::test]
async fn test_unknown_session_and_node() {
    let engine = TreeOfThoughts::heuristic();

    assert!(matches!(
        engine.select_best_path("missing").await,
        Err(ReasoningError::SessionNotFound { .. })
    ));
    assert!(matches!(
        engine.get_tree_visualization("missing").await,
        Err(ReasoningError::SessionNotFound { .. })
    ));

    engine.start_session("s", PROBLEM, None).unwrap();
    assert!(matches!(
        engine.expand_node("s", "node-99").await,
        Err(ReasoningError::NodeNotFound { .. })
    ));
}

#[tokio::test]
async fn test_invalid_input_rejected() {
    let engine = TreeOfThoughts::heuristic();

    assert!(matches!(
        engine.start_session("s", "   ", None),
        Err(ReasoningError::Validation { .. })
    ));
    assert!(matches!(
        engine.start_session("s", PROBLEM, Some(TotConfig::default().with_max_depth(0))),
        Err(ReasoningError::Configuration { .. })
    ));
    assert!(matches!(
        engine.start_session("s", PROBLEM, Some(TotConfig::default().with_pruning_threshold(1.5))),
        Err(ReasoningError::Configuration { .. })
    ));
    assert!(!engine.store().contains("s"));
}

#[tokio::test]
async fn test_delete_and_list_sessions() {
    let engine = TreeOfThoughts::heuristic();
    engine.start_session("one", PROBLEM, None).unwrap();
    engine.start_session("two", "Choose a database", None).unwrap();

    let listed: Vec<String> = engine.list_sessions().await.into_iter().map(|s| s.id).collect();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&"one".to_string()));

    assert!(engine.delete_session("one"));
    assert!(!engine.delete_session("one"));
    assert_eq!(engine.list_sessions().await.len(), 1);
}

// ============================================================================
// Interruption
// ============================================================================

#[tokio::test]
async fn test_cancelled_run_still_responds() {
    let engine = TreeOfThoughts::heuristic();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = engine
        .generate_response_with("x", PROBLEM, None, RunOptions::default().with_cancel(cancel))
        .await
        .unwrap();

    assert_eq!(response.primary_response, DEGRADED_SOLUTION);
    assert_eq!(response.metadata.complexity_score, 0.0);
}

#[tokio::test]
async fn test_engine_timeout_applies_to_runs() {
    let engine = TreeOfThoughts::heuristic().with_exploration_timeout(Duration::ZERO);
    let response = engine.generate_response("t", PROBLEM, None).await.unwrap();

    assert_eq!(response.primary_response, DEGRADED_SOLUTION);
    assert!(engine.get_session("t").await.unwrap().is_complete);
}
