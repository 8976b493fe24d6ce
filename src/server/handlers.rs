use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::SharedState;
use crate::error::{McpError, McpResult, ReasoningError};
use crate::tot::{
    Evaluation, EvaluationMethod, RunOptions, SearchStrategy, SessionSummary, ThoughtNode, TotConfig,
};

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "reasoning_tot" => handle_solve(state, arguments).await,
        "reasoning_tot_start" => handle_start(state, arguments).await,
        "reasoning_tot_expand" => handle_expand(state, arguments).await,
        "reasoning_tot_evaluate" => handle_evaluate(state, arguments).await,
        "reasoning_tot_select" => handle_select(state, arguments).await,
        "reasoning_tot_visualize" => handle_visualize(state, arguments).await,
        "reasoning_tot_delete" => handle_delete(state, arguments).await,
        "reasoning_tot_list" => handle_list(state).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Parameter and result types
// ============================================================================

/// Per-call overrides layered on the server's default session config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default, alias = "maxDepth")]
    pub max_depth: Option<usize>,
    #[serde(default, alias = "branchingFactor")]
    pub branching_factor: Option<usize>,
    #[serde(default, alias = "searchStrategy")]
    pub search_strategy: Option<SearchStrategy>,
    #[serde(default, alias = "evaluationMethod")]
    pub evaluation_method: Option<EvaluationMethod>,
    #[serde(default, alias = "pruningThreshold")]
    pub pruning_threshold: Option<f64>,
}

impl ConfigOverrides {
    pub fn apply(&self, base: TotConfig) -> TotConfig {
        TotConfig {
            max_depth: self.max_depth.unwrap_or(base.max_depth),
            branching_factor: self.branching_factor.unwrap_or(base.branching_factor),
            search_strategy: self.search_strategy.unwrap_or(base.search_strategy),
            evaluation_method: self.evaluation_method.unwrap_or(base.evaluation_method),
            pruning_threshold: self.pruning_threshold.unwrap_or(base.pruning_threshold),
        }
    }
}

/// Input for `reasoning_tot`.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveParams {
    pub problem: String,
    /// Generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub config: Option<ConfigOverrides>,
    /// Wall-clock budget for exploration.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Input for `reasoning_tot_start`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartParams {
    pub problem: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub config: Option<ConfigOverrides>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeParams {
    pub session_id: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateParams {
    pub session_id: String,
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionParams {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartResult {
    pub session_id: String,
    pub root_node_id: String,
    pub config: TotConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpandResult {
    pub session_id: String,
    pub node_id: String,
    pub children: Vec<ThoughtNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateResult {
    pub session_id: String,
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectResult {
    pub session_id: String,
    pub path: Vec<String>,
    /// Content of each node on the path, root first.
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub session_id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub sessions: Vec<SessionSummary>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle reasoning_tot: full start-explore-select-synthesize run
async fn handle_solve(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("reasoning_tot", arguments, |params: SolveParams| async move {
        let session_id = params
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let config = resolve_config(state, params.config.as_ref());
        let options = match params.timeout_ms {
            Some(ms) => RunOptions::default().with_timeout(Duration::from_millis(ms)),
            None => RunOptions::default(),
        };
        state
            .engine
            .generate_response_with(&session_id, &params.problem, config, options)
            .await
    })
    .await
}

/// Handle reasoning_tot_start: create or reset a session
async fn handle_start(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("reasoning_tot_start", arguments, |params: StartParams| async move {
        let session_id = params
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let config = resolve_config(state, params.config.as_ref());
        let session = state
            .engine
            .start_session(&session_id, &params.problem, config)?;
        Ok::<_, ReasoningError>(StartResult {
            session_id: session.id,
            root_node_id: session.root_node_id,
            config: session.config,
        })
    })
    .await
}

/// Handle reasoning_tot_expand: expand one node and return its children
async fn handle_expand(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("reasoning_tot_expand", arguments, |params: NodeParams| async move {
        let child_ids = state
            .engine
            .expand_node(&params.session_id, &params.node_id)
            .await?;
        let session = state.engine.get_session(&params.session_id).await?;
        let children = child_ids
            .iter()
            .filter_map(|id| session.node(id).cloned())
            .collect();
        Ok::<_, ReasoningError>(ExpandResult {
            session_id: params.session_id,
            node_id: params.node_id,
            children,
        })
    })
    .await
}

/// Handle reasoning_tot_evaluate: re-score nodes
async fn handle_evaluate(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("reasoning_tot_evaluate", arguments, |params: EvaluateParams| async move {
        let evaluations = state
            .engine
            .evaluate_nodes(&params.session_id, &params.node_ids)
            .await?;
        Ok::<_, ReasoningError>(EvaluateResult {
            session_id: params.session_id,
            evaluations,
        })
    })
    .await
}

/// Handle reasoning_tot_select: greedy best path
async fn handle_select(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("reasoning_tot_select", arguments, |params: SessionParams| async move {
        let path = state.engine.select_best_path(&params.session_id).await?;
        let session = state.engine.get_session(&params.session_id).await?;
        let steps = path
            .iter()
            .filter_map(|id| session.node(id).map(|n| n.content.clone()))
            .collect();
        Ok::<_, ReasoningError>(SelectResult {
            session_id: params.session_id,
            path,
            steps,
        })
    })
    .await
}

/// Handle reasoning_tot_visualize: nested tree view
async fn handle_visualize(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("reasoning_tot_visualize", arguments, |params: SessionParams| async move {
        state.engine.get_tree_visualization(&params.session_id).await
    })
    .await
}

/// Handle reasoning_tot_delete
async fn handle_delete(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SessionParams = parse_arguments("reasoning_tot_delete", arguments)?;
    let deleted = state.engine.delete_session(&params.session_id);
    serde_json::to_value(DeleteResult {
        session_id: params.session_id,
        deleted,
    })
    .map_err(McpError::Json)
}

/// Handle reasoning_tot_list. Takes no arguments.
async fn handle_list(state: &SharedState) -> McpResult<Value> {
    let sessions = state.engine.list_sessions().await;
    serde_json::to_value(ListResult { sessions }).map_err(McpError::Json)
}

// ============================================================================
// Helper functions
// ============================================================================

/// `None` when the caller sent no overrides, so the engine's defaults apply.
fn resolve_config(state: &SharedState, overrides: Option<&ConfigOverrides>) -> Option<TotConfig> {
    overrides.map(|o| o.apply(*state.engine.defaults()))
}

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Parse typed params, run the engine operation, serialize the result.
async fn execute_handler<P, R, E, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    E: std::fmt::Display,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;

    let result = operation(params)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(result).map_err(McpError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LogFormat, LoggingConfig, PipeConfig, ReasoningConfig, RequestConfig};
    use crate::server::AppState;
    use crate::tot::TreeOfThoughts;
    use serde_json::json;
    use std::sync::Arc;

    fn test_state() -> SharedState {
        let config = Config {
            langbase: None,
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            request: RequestConfig::default(),
            pipes: PipeConfig {
                thoughts: "tot-thought-generator-v1".to_string(),
            },
            reasoning: ReasoningConfig::default(),
        };
        Arc::new(AppState::new(config, TreeOfThoughts::heuristic()))
    }

    // ========================================================================
    // Argument parsing
    // ========================================================================

    #[test]
    fn test_parse_arguments_missing_arguments() {
        let result: McpResult<SessionParams> = parse_arguments("reasoning_tot_select", None);
        match result {
            Err(McpError::InvalidParameters { tool_name, message }) => {
                assert_eq!(tool_name, "reasoning_tot_select");
                assert_eq!(message, "Missing arguments");
            }
            other => panic!("expected InvalidParameters, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_solve_params_with_camel_case_config() {
        let params: SolveParams = parse_arguments(
            "reasoning_tot",
            Some(json!({
                "problem": "Plan a product launch",
                "config": {"maxDepth": 2, "searchStrategy": "breadth-first"}
            })),
        )
        .unwrap();

        let config = params.config.unwrap().apply(TotConfig::default());
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.search_strategy, SearchStrategy::BreadthFirst);
        assert_eq!(config.branching_factor, 3);
        assert!(params.session_id.is_none());
    }

    #[test]
    fn test_parse_evaluate_params_wrong_type() {
        let result: McpResult<EvaluateParams> = parse_arguments(
            "reasoning_tot_evaluate",
            Some(json!({"session_id": "s", "node_ids": "node-1"})),
        );
        assert!(matches!(result, Err(McpError::InvalidParameters { .. })));
    }

    // ========================================================================
    // Tool routing
    // ========================================================================

    #[tokio::test]
    async fn test_unknown_tool() {
        let state = test_state();
        let result = handle_tool_call(&state, "reasoning_linear", None).await;
        assert!(matches!(result, Err(McpError::UnknownTool { .. })));
    }

    #[tokio::test]
    async fn test_solve_returns_response() {
        let state = test_state();
        let value = handle_tool_call(
            &state,
            "reasoning_tot",
            Some(json!({"problem": "Plan a product launch", "session_id": "solve-1"})),
        )
        .await
        .unwrap();

        assert_eq!(value["type"], "tree-of-thoughts");
        let confidence = value["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert!(state.engine.store().contains("solve-1"));
    }

    #[tokio::test]
    async fn test_manual_workflow() {
        let state = test_state();

        let started = handle_tool_call(
            &state,
            "reasoning_tot_start",
            Some(json!({"problem": "Plan a product launch", "session_id": "manual"})),
        )
        .await
        .unwrap();
        assert_eq!(started["root_node_id"], "node-0");

        let expanded = handle_tool_call(
            &state,
            "reasoning_tot_expand",
            Some(json!({"session_id": "manual", "node_id": "node-0"})),
        )
        .await
        .unwrap();
        assert_eq!(expanded["children"].as_array().unwrap().len(), 3);

        let selected = handle_tool_call(
            &state,
            "reasoning_tot_select",
            Some(json!({"session_id": "manual"})),
        )
        .await
        .unwrap();
        assert_eq!(selected["path"].as_array().unwrap().len(), 2);

        let tree = handle_tool_call(
            &state,
            "reasoning_tot_visualize",
            Some(json!({"session_id": "manual"})),
        )
        .await
        .unwrap();
        assert_eq!(tree["total_nodes"], 4);

        let deleted = handle_tool_call(
            &state,
            "reasoning_tot_delete",
            Some(json!({"session_id": "manual"})),
        )
        .await
        .unwrap();
        assert_eq!(deleted["deleted"], true);

        let listed = handle_tool_call(&state, "reasoning_tot_list", None).await.unwrap();
        assert!(listed["sessions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_execution_failure() {
        let state = test_state();
        let result = handle_tool_call(
            &state,
            "reasoning_tot_select",
            Some(json!({"session_id": "missing"})),
        )
        .await;

        match result {
            Err(McpError::ExecutionFailed { message }) => {
                assert!(message.contains("Session not found"));
            }
            other => panic!("expected ExecutionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_override_rejected() {
        let state = test_state();
        let result = handle_tool_call(
            &state,
            "reasoning_tot_start",
            Some(json!({"problem": "p", "config": {"branching_factor": 0}})),
        )
        .await;
        assert!(matches!(result, Err(McpError::ExecutionFailed { .. })));
    }
}
