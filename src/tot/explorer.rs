//! Frontier-driven search over a session's thought tree.
//!
//! Each node moves through QUEUED -> EXPANDING -> EVALUATED and then is
//! either PROMISING (its children are queued) or PRUNED. The loop itself is
//! sequential per session so the reasoning trail is a deterministic function
//! of strategy, generator and evaluator. Within one expansion the sibling
//! evaluations run concurrently against a snapshot of the arena and are
//! written back by this single driver.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::evaluator::NodeEvaluator;
use super::generator::ThoughtGenerator;
use super::store::SessionHandle;
use super::types::{Evaluation, SearchStrategy, Session};
use crate::error::{GeneratorError, ReasoningResult};

/// Default hard cap on explored nodes per run.
pub const DEFAULT_EXPLORATION_CAP: usize = 50;

/// Default per-call budget for the thought generator.
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Knobs that are fixed for an explorer instance.
#[derive(Debug, Clone, Copy)]
pub struct ExplorerSettings {
    /// Safety valve against generators that never run dry.
    pub exploration_cap: usize,
    pub generator_timeout: Duration,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            exploration_cap: DEFAULT_EXPLORATION_CAP,
            generator_timeout: DEFAULT_GENERATOR_TIMEOUT,
        }
    }
}

/// Per-run controls supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Wall-clock budget for the whole exploration.
    pub timeout: Option<Duration>,
    /// Checked once per frontier iteration.
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Why an exploration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FrontierExhausted,
    CapReached,
    Cancelled,
    TimedOut,
}

/// Summary of one exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationOutcome {
    /// Distinct nodes popped and processed.
    pub explored: usize,
    /// Expansions performed during this run.
    pub expansions: usize,
    pub stop_reason: StopReason,
}

/// Children created by one expansion, with their evaluations in order.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub evaluations: Vec<Evaluation>,
    /// False when the node had already been expanded.
    pub performed: bool,
    /// The exploration budget ran out before generation finished; the node
    /// was left unexpanded.
    pub deferred: bool,
}

impl Expansion {
    pub fn child_ids(&self) -> Vec<String> {
        self.evaluations.iter().map(|e| e.node_id.clone()).collect()
    }
}

/// Drives generator and evaluator over a session tree.
#[derive(Clone)]
pub struct TreeExplorer {
    generator: Arc<dyn ThoughtGenerator>,
    evaluator: Arc<dyn NodeEvaluator>,
    settings: ExplorerSettings,
}

impl TreeExplorer {
    pub fn new(
        generator: Arc<dyn ThoughtGenerator>,
        evaluator: Arc<dyn NodeEvaluator>,
        settings: ExplorerSettings,
    ) -> Self {
        Self {
            generator,
            evaluator,
            settings,
        }
    }

    pub fn settings(&self) -> &ExplorerSettings {
        &self.settings
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn evaluator_name(&self) -> &str {
        self.evaluator.name()
    }

    /// Run the frontier loop from the root until it empties, the cap is
    /// hit, the caller cancels, or the deadline passes.
    pub async fn explore(
        &self,
        handle: &SessionHandle,
        options: &RunOptions,
    ) -> ReasoningResult<ExplorationOutcome> {
        let deadline = options.timeout.map(|t| Instant::now() + t);

        let (session_id, root_id, strategy, threshold, max_depth) = {
            let session = handle.lock().await;
            (
                session.id.clone(),
                session.root_node_id.clone(),
                session.config.search_strategy,
                session.config.pruning_threshold,
                session.config.max_depth,
            )
        };

        let mut frontier: VecDeque<String> = VecDeque::from([root_id]);
        let mut explored: HashSet<String> = HashSet::new();
        let mut expansions = 0;
        let mut stop_reason = StopReason::FrontierExhausted;

        debug!(session_id = %session_id, strategy = %strategy, "Exploration started");

        while !frontier.is_empty() {
            if explored.len() >= self.settings.exploration_cap {
                warn!(
                    session_id = %session_id,
                    cap = self.settings.exploration_cap,
                    queued = frontier.len(),
                    "Exploration cap reached, stopping search"
                );
                stop_reason = StopReason::CapReached;
                break;
            }
            if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                info!(session_id = %session_id, "Exploration cancelled");
                stop_reason = StopReason::Cancelled;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(session_id = %session_id, "Exploration deadline passed");
                stop_reason = StopReason::TimedOut;
                break;
            }

            let (node_id, depth, value) = {
                let session = handle.lock().await;
                let Some(node_id) = pop_next(&mut frontier, strategy, &session) else {
                    break;
                };
                let node = session.require_node(&node_id)?;
                (node_id, node.depth, node.value)
            };

            if !explored.insert(node_id.clone()) {
                continue;
            }

            // The root is always expanded whatever its seed value.
            if depth < max_depth && (value >= threshold || depth == 0) {
                let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
                let expansion = self.expand_within(handle, &node_id, remaining).await?;
                if expansion.deferred {
                    explored.remove(&node_id);
                    warn!(session_id = %session_id, node_id = %node_id, "Exploration deadline passed during generation");
                    stop_reason = StopReason::TimedOut;
                    break;
                }
                if expansion.performed {
                    expansions += 1;
                }
                frontier.extend(
                    expansion
                        .evaluations
                        .into_iter()
                        .filter(|e| e.is_promising)
                        .map(|e| e.node_id),
                );
            } else {
                debug!(node_id = %node_id, depth = depth, value = value, "Node pruned");
            }
        }

        {
            let mut session = handle.lock().await;
            session.explored_count = explored.len();
        }

        info!(
            session_id = %session_id,
            explored = explored.len(),
            expansions = expansions,
            stop_reason = ?stop_reason,
            "Exploration finished"
        );

        Ok(ExplorationOutcome {
            explored: explored.len(),
            expansions,
            stop_reason,
        })
    }

    /// Expand one node: generate children, insert them, evaluate them.
    ///
    /// Idempotent: a node that was already expanded returns its existing
    /// children's current values without calling the generator again.
    pub async fn expand(&self, handle: &SessionHandle, node_id: &str) -> ReasoningResult<Expansion> {
        self.expand_within(handle, node_id, None).await
    }

    async fn expand_within(
        &self,
        handle: &SessionHandle,
        node_id: &str,
        budget: Option<Duration>,
    ) -> ReasoningResult<Expansion> {
        let (parent_content, problem, depth, branching_factor) = {
            let session = handle.lock().await;
            let node = session.require_node(node_id)?;
            if node.is_expanded {
                return Ok(existing_children(&session, node_id));
            }
            (
                node.content.clone(),
                session.problem.clone(),
                node.depth,
                session.config.branching_factor,
            )
        };

        if budget.is_some_and(|b| b.is_zero()) {
            return Ok(Expansion {
                deferred: true,
                ..Expansion::default()
            });
        }
        // A timeout caused by the caller's budget says nothing about the generator.
        let budget_bound = budget.is_some_and(|b| b < self.settings.generator_timeout);
        let timeout = budget
            .map(|b| b.min(self.settings.generator_timeout))
            .unwrap_or(self.settings.generator_timeout);

        let (thoughts, note) = match self
            .generate(&parent_content, &problem, depth, branching_factor, timeout)
            .await
        {
            Ok(thoughts) => (sanitize(thoughts, branching_factor), None),
            Err(GeneratorError::Timeout { .. }) if budget_bound => {
                debug!(node_id = %node_id, "Exploration budget spent during generation, node left unexpanded");
                return Ok(Expansion {
                    deferred: true,
                    ..Expansion::default()
                });
            }
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Thought generation failed, branch not expanded");
                (Vec::new(), Some(format!("Generation failed: {}", e)))
            }
        };

        // Insert children and take the snapshot the evaluations run against.
        let (children, snapshot) = {
            let mut session = handle.lock().await;
            if session.require_node(node_id)?.is_expanded {
                return Ok(existing_children(&session, node_id));
            }
            let mut children = Vec::with_capacity(thoughts.len());
            for thought in thoughts {
                let child_id = session.add_child(node_id, thought)?;
                if let Some(child) = session.node(&child_id) {
                    children.push(child.clone());
                }
            }
            if let Some(node) = session.node_mut(node_id) {
                node.is_expanded = true;
            }
            (children, session.clone())
        };

        let evaluator = &self.evaluator;
        let snapshot = &snapshot;
        let evaluations: Vec<Evaluation> = join_all(children.iter().map(|child| async move {
            match evaluator.evaluate(child, snapshot).await {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    warn!(node_id = %child.id, error = %e, "Evaluation failed, scoring as zero");
                    Evaluation::failed(child.id.clone(), e)
                }
            }
        }))
        .await;

        {
            let mut session = handle.lock().await;
            for evaluation in &evaluations {
                session.apply_evaluation(evaluation)?;
            }
            session.record_step(node_id, depth, &parent_content, evaluations.len(), note);
        }

        debug!(
            node_id = %node_id,
            depth = depth,
            children = evaluations.len(),
            promising = evaluations.iter().filter(|e| e.is_promising).count(),
            "Node expanded"
        );

        Ok(Expansion {
            evaluations,
            performed: true,
            deferred: false,
        })
    }

    async fn generate(
        &self,
        parent_content: &str,
        problem: &str,
        depth: usize,
        max_thoughts: usize,
        timeout: Duration,
    ) -> Result<Vec<String>, GeneratorError> {
        match tokio::time::timeout(
            timeout,
            self.generator
                .generate(parent_content, problem, depth, max_thoughts),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Re-score the given nodes against the current arena.
    pub async fn evaluate_nodes(
        &self,
        handle: &SessionHandle,
        node_ids: &[String],
    ) -> ReasoningResult<Vec<Evaluation>> {
        let (nodes, snapshot) = {
            let session = handle.lock().await;
            let mut nodes = Vec::with_capacity(node_ids.len());
            for id in node_ids {
                nodes.push(session.require_node(id)?.clone());
            }
            (nodes, session.clone())
        };

        let evaluator = &self.evaluator;
        let snapshot = &snapshot;
        let evaluations: Vec<Evaluation> = join_all(nodes.iter().map(|node| async move {
            evaluator
                .evaluate(node, snapshot)
                .await
                .unwrap_or_else(|e| {
                    warn!(node_id = %node.id, error = %e, "Evaluation failed, scoring as zero");
                    Evaluation::failed(node.id.clone(), e)
                })
        }))
        .await;

        let mut session = handle.lock().await;
        for evaluation in &evaluations {
            session.apply_evaluation(evaluation)?;
        }
        Ok(evaluations)
    }
}

/// Pop the next id according to `strategy`.
fn pop_next(frontier: &mut VecDeque<String>, strategy: SearchStrategy, session: &Session) -> Option<String> {
    match strategy {
        SearchStrategy::BreadthFirst => frontier.pop_front(),
        SearchStrategy::DepthFirst => frontier.pop_back(),
        SearchStrategy::BestFirst => {
            let mut best: Option<(usize, f64)> = None;
            for (index, id) in frontier.iter().enumerate() {
                let value = session.node(id).map(|n| n.value).unwrap_or(0.0);
                // Strictly greater keeps the earliest queued on ties.
                if best.map_or(true, |(_, v)| value > v) {
                    best = Some((index, value));
                }
            }
            best.and_then(|(index, _)| frontier.remove(index))
        }
    }
}

/// Trim, drop blanks and duplicates, and cut to the branching factor.
fn sanitize(thoughts: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    thoughts
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .take(limit)
        .collect()
}

fn existing_children(session: &Session, node_id: &str) -> Expansion {
    let evaluations = session
        .node(node_id)
        .map(|node| {
            node.children
                .iter()
                .filter_map(|id| session.node(id))
                .map(|child| Evaluation {
                    node_id: child.id.clone(),
                    value: child.value,
                    reasoning: child.metadata.evaluation_reason.clone().unwrap_or_default(),
                    is_promising: child.value >= session.config.pruning_threshold,
                    should_expand: child.value >= super::evaluator::EXPAND_THRESHOLD
                        && child.depth < session.config.max_depth,
                })
                .collect()
        })
        .unwrap_or_default();

    Expansion {
        evaluations,
        performed: false,
        deferred: false,
    }
}
