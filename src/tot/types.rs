//! Session arena and node types for Tree-of-Thoughts reasoning.
//!
//! A [`Session`] exclusively owns every [`ThoughtNode`] of one reasoning task
//! in a flat id-addressed map. Nodes refer to each other only by id: a
//! node's `parent_id` is a non-owning back-reference used for traversal,
//! while `children` records existence and order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ReasoningError, ReasoningResult};

/// Value a freshly created root is seeded with.
pub const NEUTRAL_SEED_VALUE: f64 = 0.5;

/// Order in which the explorer pops the frontier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    /// FIFO frontier.
    #[serde(alias = "breadth_first", alias = "bfs")]
    BreadthFirst,
    /// LIFO frontier.
    #[serde(alias = "depth_first", alias = "dfs")]
    DepthFirst,
    /// Highest value first, ties broken by insertion order.
    #[default]
    #[serde(alias = "best_first")]
    BestFirst,
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchStrategy::BreadthFirst => write!(f, "breadth-first"),
            SearchStrategy::DepthFirst => write!(f, "depth-first"),
            SearchStrategy::BestFirst => write!(f, "best-first"),
        }
    }
}

impl std::str::FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "breadth-first" | "bfs" => Ok(SearchStrategy::BreadthFirst),
            "depth-first" | "dfs" => Ok(SearchStrategy::DepthFirst),
            "best-first" => Ok(SearchStrategy::BestFirst),
            _ => Err(format!("Unknown search strategy: {}", s)),
        }
    }
}

/// How node values are computed.
///
/// Only `Confidence` (the four-factor heuristic average) has defined
/// semantics. `Value` and `Vote` are accepted and scored as `Confidence`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    Value,
    Vote,
    #[default]
    Confidence,
}

impl std::fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationMethod::Value => write!(f, "value"),
            EvaluationMethod::Vote => write!(f, "vote"),
            EvaluationMethod::Confidence => write!(f, "confidence"),
        }
    }
}

impl std::str::FromStr for EvaluationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "value" => Ok(EvaluationMethod::Value),
            "vote" => Ok(EvaluationMethod::Vote),
            "confidence" => Ok(EvaluationMethod::Confidence),
            _ => Err(format!("Unknown evaluation method: {}", s)),
        }
    }
}

/// Per-session search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotConfig {
    /// Deepest level that may still be created (root is depth 0).
    #[serde(default = "default_max_depth", alias = "maxDepth")]
    pub max_depth: usize,
    /// Maximum children created per expansion.
    #[serde(default = "default_branching_factor", alias = "branchingFactor")]
    pub branching_factor: usize,
    #[serde(default, alias = "evaluationMethod")]
    pub evaluation_method: EvaluationMethod,
    #[serde(default, alias = "searchStrategy")]
    pub search_strategy: SearchStrategy,
    /// Nodes scoring below this are never queued for expansion.
    #[serde(default = "default_pruning_threshold", alias = "pruningThreshold")]
    pub pruning_threshold: f64,
}

fn default_max_depth() -> usize {
    4
}

fn default_branching_factor() -> usize {
    3
}

fn default_pruning_threshold() -> f64 {
    0.3
}

impl Default for TotConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            branching_factor: default_branching_factor(),
            evaluation_method: EvaluationMethod::default(),
            search_strategy: SearchStrategy::default(),
            pruning_threshold: default_pruning_threshold(),
        }
    }
}

impl TotConfig {
    /// Reject configurations the explorer cannot run.
    pub fn validate(&self) -> ReasoningResult<()> {
        if self.max_depth == 0 {
            return Err(ReasoningError::Configuration {
                message: "max_depth must be at least 1".to_string(),
            });
        }
        if self.branching_factor == 0 {
            return Err(ReasoningError::Configuration {
                message: "branching_factor must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.pruning_threshold) {
            return Err(ReasoningError::Configuration {
                message: format!(
                    "pruning_threshold must be within [0, 1], got {}",
                    self.pruning_threshold
                ),
            });
        }
        Ok(())
    }

    /// Set the maximum depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the branching factor
    pub fn with_branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor;
        self
    }

    /// Set the search strategy
    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.search_strategy = strategy;
        self
    }

    /// Set the evaluation method
    pub fn with_evaluation_method(mut self, method: EvaluationMethod) -> Self {
        self.evaluation_method = method;
        self
    }

    /// Set the pruning threshold
    pub fn with_pruning_threshold(mut self, threshold: f64) -> Self {
        self.pruning_threshold = threshold;
        self
    }
}

/// Bookkeeping attached to each node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub timestamp: DateTime<Utc>,
    /// Session-wide creation order; the root is 0.
    pub generation_index: usize,
    /// Explanation written by the last evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_reason: Option<String>,
}

/// A candidate reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtNode {
    pub id: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub depth: usize,
    /// Always within [0, 1].
    pub value: f64,
    pub is_expanded: bool,
    pub is_selected: bool,
    pub metadata: NodeMetadata,
}

impl ThoughtNode {
    fn new(id: String, content: String, parent_id: Option<String>, depth: usize, index: usize) -> Self {
        Self {
            id,
            content,
            parent_id,
            children: Vec::new(),
            depth,
            value: NEUTRAL_SEED_VALUE,
            is_expanded: false,
            is_selected: false,
            metadata: NodeMetadata {
                timestamp: Utc::now(),
                generation_index: index,
                evaluation_reason: None,
            },
        }
    }

    /// Whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Store a value, clamped to [0, 1]. NaN collapses to 0.
    pub fn set_value(&mut self, value: f64) {
        self.value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    }
}

/// Ephemeral result of scoring one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub node_id: String,
    pub value: f64,
    pub reasoning: String,
    pub is_promising: bool,
    pub should_expand: bool,
}

impl Evaluation {
    /// Fail-safe low score used when an evaluator errors.
    pub fn failed(node_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            node_id: node_id.into(),
            value: 0.0,
            reasoning: format!("Evaluation failed: {}", reason),
            is_promising: false,
            should_expand: false,
        }
    }
}

/// One entry of the exploration audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based position in the trail.
    pub step: usize,
    pub node_id: String,
    pub depth: usize,
    pub parent_content: String,
    pub children_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One isolated reasoning task and its node arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub problem: String,
    pub root_node_id: String,
    pub nodes: HashMap<String, ThoughtNode>,
    pub config: TotConfig,
    pub is_complete: bool,
    /// Root-to-leaf ids, empty until a path is selected.
    pub selected_path: Vec<String>,
    pub reasoning_steps: Vec<ReasoningStep>,
    /// Nodes explored by the most recent exploration run.
    pub explored_count: usize,
    pub created_at: DateTime<Utc>,
    next_index: usize,
}

impl Session {
    /// Create a session with a root node wrapping the problem statement.
    pub fn new(id: impl Into<String>, problem: impl Into<String>, config: TotConfig) -> Self {
        let problem = problem.into();
        let root_id = node_id(0);
        let root = ThoughtNode::new(
            root_id.clone(),
            format!("Problem: {}", problem),
            None,
            0,
            0,
        );

        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), root);

        Self {
            id: id.into(),
            problem,
            root_node_id: root_id,
            nodes,
            config,
            is_complete: false,
            selected_path: Vec::new(),
            reasoning_steps: Vec::new(),
            explored_count: 0,
            created_at: Utc::now(),
            next_index: 1,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.config.max_depth
    }

    pub fn branching_factor(&self) -> usize {
        self.config.branching_factor
    }

    pub fn root(&self) -> &ThoughtNode {
        &self.nodes[&self.root_node_id]
    }

    pub fn node(&self, id: &str) -> Option<&ThoughtNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ThoughtNode> {
        self.nodes.get_mut(id)
    }

    /// Look up a node or fail with [`ReasoningError::NodeNotFound`].
    pub fn require_node(&self, id: &str) -> ReasoningResult<&ThoughtNode> {
        self.nodes.get(id).ok_or_else(|| ReasoningError::NodeNotFound {
            session_id: self.id.clone(),
            node_id: id.to_string(),
        })
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes ordered by creation.
    pub fn nodes_in_order(&self) -> Vec<&ThoughtNode> {
        let mut nodes: Vec<&ThoughtNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| n.metadata.generation_index);
        nodes
    }

    /// Create a child under `parent_id` at `parent.depth + 1`.
    pub fn add_child(&mut self, parent_id: &str, content: impl Into<String>) -> ReasoningResult<String> {
        let depth = self.require_node(parent_id)?.depth + 1;
        let index = self.next_index;
        let id = node_id(index);
        self.next_index += 1;

        let child = ThoughtNode::new(
            id.clone(),
            content.into(),
            Some(parent_id.to_string()),
            depth,
            index,
        );
        self.nodes.insert(id.clone(), child);
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(id.clone());
        }
        Ok(id)
    }

    /// Write an evaluation's value and reasoning into its node.
    pub fn apply_evaluation(&mut self, evaluation: &Evaluation) -> ReasoningResult<()> {
        let session_id = self.id.clone();
        let node = self
            .nodes
            .get_mut(&evaluation.node_id)
            .ok_or_else(|| ReasoningError::NodeNotFound {
                session_id,
                node_id: evaluation.node_id.clone(),
            })?;
        node.set_value(evaluation.value);
        node.metadata.evaluation_reason = Some(evaluation.reasoning.clone());
        Ok(())
    }

    /// Append an expansion record, numbering it.
    pub fn record_step(
        &mut self,
        node_id: &str,
        depth: usize,
        parent_content: &str,
        children_created: usize,
        note: Option<String>,
    ) {
        let step = self.reasoning_steps.len() + 1;
        self.reasoning_steps.push(ReasoningStep {
            step,
            node_id: node_id.to_string(),
            depth,
            parent_content: parent_content.to_string(),
            children_created,
            note,
        });
    }

    /// Drop any previous selection so a single chain can be marked.
    pub fn clear_selection(&mut self) {
        for node in self.nodes.values_mut() {
            node.is_selected = false;
        }
        self.selected_path.clear();
    }
}

fn node_id(index: usize) -> String {
    format!("node-{}", index)
}

/// Nested debugging view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeVisualization {
    pub session_id: String,
    pub problem: String,
    pub total_nodes: usize,
    pub selected_path: Vec<String>,
    pub is_complete: bool,
    pub tree: TreeNodeView,
}

/// A node and its subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNodeView {
    pub id: String,
    pub content: String,
    pub depth: usize,
    pub value: f64,
    pub is_expanded: bool,
    pub is_selected: bool,
    pub children: Vec<TreeNodeView>,
}

impl TreeVisualization {
    /// Render the whole arena starting at the root.
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            problem: session.problem.clone(),
            total_nodes: session.total_nodes(),
            selected_path: session.selected_path.clone(),
            is_complete: session.is_complete,
            tree: view_of(session, session.root()),
        }
    }
}

fn view_of(session: &Session, node: &ThoughtNode) -> TreeNodeView {
    TreeNodeView {
        id: node.id.clone(),
        content: node.content.clone(),
        depth: node.depth,
        value: node.value,
        is_expanded: node.is_expanded,
        is_selected: node.is_selected,
        children: node
            .children
            .iter()
            .filter_map(|id| session.node(id))
            .map(|child| view_of(session, child))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_new_seeds_root() {
        let session = Session::new("s-1", "Plan a product launch", TotConfig::default());
        let root = session.root();

        assert_eq!(root.depth, 0);
        assert!(root.parent_id.is_none());
        assert_eq!(root.value, NEUTRAL_SEED_VALUE);
        assert_eq!(root.content, "Problem: Plan a product launch");
        assert_eq!(session.total_nodes(), 1);
        assert!(session.selected_path.is_empty());
        assert!(!session.is_complete);
    }

    #[test]
    fn test_add_child_links_and_depth() {
        let mut session = Session::new("s-1", "p", TotConfig::default());
        let root_id = session.root_node_id.clone();

        let a = session.add_child(&root_id, "a").unwrap();
        let b = session.add_child(&a, "b").unwrap();

        assert_eq!(session.root().children, vec![a.clone()]);
        assert_eq!(session.node(&a).unwrap().depth, 1);
        assert_eq!(session.node(&b).unwrap().depth, 2);
        assert_eq!(session.node(&b).unwrap().parent_id.as_deref(), Some(a.as_str()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_add_child_unknown_parent() {
        let mut session = Session::new("s-1", "p", TotConfig::default());
        let err = session.add_child("node-99", "orphan").unwrap_err();
        assert!(matches!(err, ReasoningError::NodeNotFound { .. }));
        assert_eq!(session.total_nodes(), 1);
    }

    #[test]
    fn test_set_value_clamps() {
        let mut session = Session::new("s-1", "p", TotConfig::default());
        let root_id = session.root_node_id.clone();
        let node = session.node_mut(&root_id).unwrap();

        node.set_value(1.7);
        assert_eq!(node.value, 1.0);
        node.set_value(-0.2);
        assert_eq!(node.value, 0.0);
        node.set_value(f64::NAN);
        assert_eq!(node.value, 0.0);
    }

    #[test]
    fn test_apply_evaluation_writes_metadata() {
        let mut session = Session::new("s-1", "p", TotConfig::default());
        let root_id = session.root_node_id.clone();
        let child = session.add_child(&root_id, "child").unwrap();

        session
            .apply_evaluation(&Evaluation {
                node_id: child.clone(),
                value: 0.72,
                reasoning: "solid".to_string(),
                is_promising: true,
                should_expand: true,
            })
            .unwrap();

        let node = session.node(&child).unwrap();
        assert_eq!(node.value, 0.72);
        assert_eq!(node.metadata.evaluation_reason.as_deref(), Some("solid"));
    }

    #[test]
    fn test_record_step_numbers_sequentially() {
        let mut session = Session::new("s-1", "p", TotConfig::default());
        session.record_step("node-0", 0, "Problem: p", 3, None);
        session.record_step("node-1", 1, "a", 0, Some("generator failed".to_string()));

        assert_eq!(session.reasoning_steps[0].step, 1);
        assert_eq!(session.reasoning_steps[1].step, 2);
        assert_eq!(
            session.reasoning_steps[1].note.as_deref(),
            Some("generator failed")
        );
    }

    #[test]
    fn test_nodes_in_order() {
        let mut session = Session::new("s-1", "p", TotConfig::default());
        let root_id = session.root_node_id.clone();
        for i in 0..12 {
            session.add_child(&root_id, format!("c{}", i)).unwrap();
        }
        let indices: Vec<usize> = session
            .nodes_in_order()
            .iter()
            .map(|n| n.metadata.generation_index)
            .collect();
        assert_eq!(indices, (0..13).collect::<Vec<_>>());
    }

    #[test]
    fn test_config_validate() {
        assert!(TotConfig::default().validate().is_ok());
        assert!(matches!(
            TotConfig::default().with_max_depth(0).validate(),
            Err(ReasoningError::Configuration { .. })
        ));
        assert!(matches!(
            TotConfig::default().with_branching_factor(0).validate(),
            Err(ReasoningError::Configuration { .. })
        ));
        assert!(TotConfig::default().with_pruning_threshold(1.5).validate().is_err());
        assert!(TotConfig::default().with_pruning_threshold(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_config_deserialize_defaults_and_aliases() {
        let config: TotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TotConfig::default());

        let config: TotConfig = serde_json::from_str(
            r#"{"maxDepth": 2, "branchingFactor": 5, "searchStrategy": "breadth-first", "pruningThreshold": 0.5}"#,
        )
        .unwrap();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.branching_factor, 5);
        assert_eq!(config.search_strategy, SearchStrategy::BreadthFirst);
        assert_eq!(config.pruning_threshold, 0.5);

        let config: TotConfig =
            serde_json::from_str(r#"{"search_strategy": "depth_first"}"#).unwrap();
        assert_eq!(config.search_strategy, SearchStrategy::DepthFirst);
    }

    #[test]
    fn test_search_strategy_from_str() {
        assert_eq!("best-first".parse::<SearchStrategy>(), Ok(SearchStrategy::BestFirst));
        assert_eq!("BREADTH_FIRST".parse::<SearchStrategy>(), Ok(SearchStrategy::BreadthFirst));
        assert_eq!("dfs".parse::<SearchStrategy>(), Ok(SearchStrategy::DepthFirst));
        assert!("random".parse::<SearchStrategy>().is_err());
        assert_eq!(SearchStrategy::BreadthFirst.to_string(), "breadth-first");
    }

    #[test]
    fn test_evaluation_method_round_trip_names() {
        for method in [
            EvaluationMethod::Value,
            EvaluationMethod::Vote,
            EvaluationMethod::Confidence,
        ] {
            assert_eq!(method.to_string().parse::<EvaluationMethod>(), Ok(method));
        }
    }

    #[test]
    fn test_visualization_counts_every_node() {
        let mut session = Session::new("s-1", "p", TotConfig::default());
        let root_id = session.root_node_id.clone();
        let a = session.add_child(&root_id, "a").unwrap();
        session.add_child(&root_id, "b").unwrap();
        session.add_child(&a, "a1").unwrap();

        let viz = TreeVisualization::from_session(&session);
        assert_eq!(viz.total_nodes, session.nodes.len());
        assert_eq!(viz.tree.children.len(), 2);
        assert_eq!(viz.tree.children[0].children.len(), 1);
        assert_eq!(viz.tree.children[0].children[0].content, "a1");
    }

    #[test]
    fn test_failed_evaluation_is_not_promising() {
        let eval = Evaluation::failed("node-3", "boom");
        assert_eq!(eval.value, 0.0);
        assert!(!eval.is_promising);
        assert!(!eval.should_expand);
        assert_eq!(eval.reasoning, "Evaluation failed: boom");
    }
}
