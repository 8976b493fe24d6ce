//! Turns a selected path into the final reasoning response.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::types::{ReasoningStep, Session, ThoughtNode};

/// Returned when the tree never grew past its root.
pub const DEGRADED_SOLUTION: &str = "Unable to construct solution path.";

/// Response type tag.
pub const RESPONSE_TYPE: &str = "tree-of-thoughts";

const MAX_ALTERNATIVES: usize = 3;
const ALTERNATIVE_MIN_VALUE: f64 = 0.5;

/// Final output of a reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedReasoningResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub primary_response: String,
    /// Expansion records in the order they happened.
    pub reasoning_process: Vec<ReasoningStep>,
    pub confidence: f64,
    pub alternatives: Vec<String>,
    pub metadata: ResponseMetadata,
}

/// Cost and provenance of a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub processing_time_ms: u64,
    /// Explored nodes / 10. A rough linear proxy, not a calibrated measure.
    pub complexity_score: f64,
    pub resources_used: Vec<String>,
}

/// Render the path as a numbered plan ending in a final recommendation.
pub fn construct_solution(session: &Session, path: &[String]) -> String {
    if path.len() <= 1 {
        return DEGRADED_SOLUTION.to_string();
    }

    let steps: Vec<&ThoughtNode> = path.iter().skip(1).filter_map(|id| session.node(id)).collect();
    let Some(leaf) = steps.last() else {
        return DEGRADED_SOLUTION.to_string();
    };

    let mut lines = vec![format!("Solution for: {}", session.problem), String::new()];
    for (index, node) in steps.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({}%)",
            index + 1,
            node.content,
            percent(node.value)
        ));
    }
    lines.push(String::new());
    lines.push(format!("Following this path, the final recommendation is: {}", leaf.content));
    lines.join("\n")
}

/// Mean value along the path, rounded to two decimals. Zero for a bare root.
pub fn path_confidence(session: &Session, path: &[String]) -> f64 {
    if path.len() <= 1 {
        return 0.0;
    }
    let values: Vec<f64> = path
        .iter()
        .filter_map(|id| session.node(id))
        .map(|n| n.value)
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Up to three strong leaves off the chosen path, best first.
pub fn find_alternatives(session: &Session, path: &[String]) -> Vec<String> {
    let on_path: HashSet<&str> = path.iter().map(String::as_str).collect();

    let mut leaves: Vec<&ThoughtNode> = session
        .nodes_in_order()
        .into_iter()
        .filter(|n| n.is_leaf() && n.value > ALTERNATIVE_MIN_VALUE && !on_path.contains(n.id.as_str()))
        .collect();
    // Stable sort keeps creation order among equal values.
    leaves.sort_by(|a, b| b.value.total_cmp(&a.value));

    leaves
        .into_iter()
        .take(MAX_ALTERNATIVES)
        .map(|n| format!("Alternative approach: {} ({}%)", n.content, percent(n.value)))
        .collect()
}

/// Explored nodes divided by ten.
pub fn complexity_score(explored: usize) -> f64 {
    explored as f64 / 10.0
}

/// Assemble the full response for a session whose path is already selected.
pub fn synthesize(
    session: &Session,
    processing_time_ms: u64,
    resources_used: Vec<String>,
) -> AdvancedReasoningResponse {
    let path = &session.selected_path;
    AdvancedReasoningResponse {
        id: Uuid::new_v4().to_string(),
        response_type: RESPONSE_TYPE.to_string(),
        primary_response: construct_solution(session, path),
        reasoning_process: session.reasoning_steps.clone(),
        confidence: path_confidence(session, path),
        alternatives: find_alternatives(session, path),
        metadata: ResponseMetadata {
            processing_time_ms,
            complexity_score: complexity_score(session.explored_count),
            resources_used,
        },
    }
}

fn percent(value: f64) -> i64 {
    (value * 100.0).round() as i64
}
