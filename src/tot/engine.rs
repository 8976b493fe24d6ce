//! Public entry point for Tree-of-Thoughts reasoning.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::evaluator::{HeuristicEvaluator, NodeEvaluator};
use super::explorer::{ExplorationOutcome, ExplorerSettings, RunOptions, TreeExplorer};
use super::generator::{HeuristicThoughtGenerator, LangbaseThoughtGenerator, ThoughtGenerator};
use super::selector;
use super::store::{SessionStore, SessionSummary};
use super::synthesizer::{self, AdvancedReasoningResponse};
use super::types::{Evaluation, Session, TotConfig, TreeVisualization};
use crate::config::{Config, GeneratorKind};
use crate::error::{AppError, AppResult, ReasoningResult};
use crate::langbase::LangbaseClient;

/// Tree-of-Thoughts engine: a session store plus the collaborators that
/// grow, score and summarize its trees.
#[derive(Clone)]
pub struct TreeOfThoughts {
    store: Arc<SessionStore>,
    explorer: TreeExplorer,
    defaults: TotConfig,
    exploration_timeout: Option<Duration>,
}

impl TreeOfThoughts {
    /// Create an engine over a fresh store.
    pub fn new(
        generator: Arc<dyn ThoughtGenerator>,
        evaluator: Arc<dyn NodeEvaluator>,
        settings: ExplorerSettings,
    ) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            explorer: TreeExplorer::new(generator, evaluator, settings),
            defaults: TotConfig::default(),
            exploration_timeout: None,
        }
    }

    /// Engine with the deterministic generator and evaluator.
    pub fn heuristic() -> Self {
        Self::new(
            Arc::new(HeuristicThoughtGenerator::new()),
            Arc::new(HeuristicEvaluator::new()),
            ExplorerSettings::default(),
        )
    }

    /// Build from application configuration, picking the generator backend.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let generator: Arc<dyn ThoughtGenerator> = match config.reasoning.generator {
            GeneratorKind::Heuristic => Arc::new(HeuristicThoughtGenerator::new()),
            GeneratorKind::Langbase => {
                let langbase_config = config.langbase.as_ref().ok_or_else(|| AppError::Config {
                    message: "Langbase generator selected without LANGBASE_API_KEY".to_string(),
                })?;
                let client = LangbaseClient::new(langbase_config, config.request.clone())?;
                Arc::new(LangbaseThoughtGenerator::new(client, &config.pipes.thoughts))
            }
        };

        let settings = ExplorerSettings {
            exploration_cap: config.reasoning.exploration_cap,
            generator_timeout: config.reasoning.generator_timeout(),
        };

        let mut engine = Self::new(generator, Arc::new(HeuristicEvaluator::new()), settings)
            .with_defaults(config.reasoning.defaults);
        engine.exploration_timeout = config.reasoning.exploration_timeout();
        Ok(engine)
    }

    /// Share an existing store instead of the engine's own.
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Config used when a caller passes none.
    pub fn with_defaults(mut self, defaults: TotConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Wall-clock budget applied to runs that do not set their own.
    pub fn with_exploration_timeout(mut self, timeout: Duration) -> Self {
        self.exploration_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn defaults(&self) -> &TotConfig {
        &self.defaults
    }

    /// Create (or reset) a session rooted at `problem`.
    pub fn start_session(
        &self,
        session_id: &str,
        problem: &str,
        config: Option<TotConfig>,
    ) -> ReasoningResult<Session> {
        self.store
            .start_session(session_id, problem, config.unwrap_or(self.defaults))
    }

    /// Expand one node; returns its child ids. Repeated calls are no-ops.
    pub async fn expand_node(&self, session_id: &str, node_id: &str) -> ReasoningResult<Vec<String>> {
        let handle = self.store.handle(session_id)?;
        let depth_allowed = {
            let session = handle.lock().await;
            let node = session.require_node(node_id)?;
            node.is_expanded || node.depth < session.config.max_depth
        };
        if !depth_allowed {
            debug!(session_id = %session_id, node_id = %node_id, "Node at max depth, not expanded");
            return Ok(Vec::new());
        }
        let expansion = self.explorer.expand(&handle, node_id).await?;
        Ok(expansion.child_ids())
    }

    /// Score the given nodes and write the values back.
    pub async fn evaluate_nodes(
        &self,
        session_id: &str,
        node_ids: &[String],
    ) -> ReasoningResult<Vec<Evaluation>> {
        let handle = self.store.handle(session_id)?;
        self.explorer.evaluate_nodes(&handle, node_ids).await
    }

    /// Run the frontier search on an existing session.
    pub async fn explore(
        &self,
        session_id: &str,
        options: &RunOptions,
    ) -> ReasoningResult<ExplorationOutcome> {
        let handle = self.store.handle(session_id)?;
        self.explorer.explore(&handle, options).await
    }

    /// Pick the greedy best root-to-leaf path.
    pub async fn select_best_path(&self, session_id: &str) -> ReasoningResult<Vec<String>> {
        let handle = self.store.handle(session_id)?;
        let mut session = handle.lock().await;
        Ok(selector::select_best_path(&mut session))
    }

    /// Start a session, explore it, select a path and render the answer.
    pub async fn generate_response(
        &self,
        session_id: &str,
        problem: &str,
        config: Option<TotConfig>,
    ) -> ReasoningResult<AdvancedReasoningResponse> {
        self.generate_response_with(session_id, problem, config, RunOptions::default())
            .await
    }

    /// [`generate_response`](Self::generate_response) with a timeout or
    /// cancellation token. Expiry still yields a response over the partial tree.
    pub async fn generate_response_with(
        &self,
        session_id: &str,
        problem: &str,
        config: Option<TotConfig>,
        mut options: RunOptions,
    ) -> ReasoningResult<AdvancedReasoningResponse> {
        let start = Instant::now();
        if options.timeout.is_none() {
            options.timeout = self.exploration_timeout;
        }

        self.start_session(session_id, problem, config)?;
        let handle = self.store.handle(session_id)?;
        let outcome = self.explorer.explore(&handle, &options).await?;

        let mut session = handle.lock().await;
        selector::select_best_path(&mut session);
        session.is_complete = true;

        let resources = vec![
            synthesizer::RESPONSE_TYPE.to_string(),
            self.explorer.generator_name().to_string(),
            self.explorer.evaluator_name().to_string(),
        ];
        let response =
            synthesizer::synthesize(&session, start.elapsed().as_millis() as u64, resources);

        info!(
            session_id = %session_id,
            total_nodes = session.total_nodes(),
            explored = outcome.explored,
            path_length = session.selected_path.len(),
            confidence = response.confidence,
            stop_reason = ?outcome.stop_reason,
            "Tree-of-Thoughts response generated"
        );

        Ok(response)
    }

    /// Nested view of a session for debugging and assertions.
    pub async fn get_tree_visualization(&self, session_id: &str) -> ReasoningResult<TreeVisualization> {
        let session = self.store.get(session_id).await?;
        Ok(TreeVisualization::from_session(&session))
    }

    /// Snapshot of a session.
    pub async fn get_session(&self, session_id: &str) -> ReasoningResult<Session> {
        self.store.get(session_id).await
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        self.store.delete_session(session_id)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list_sessions().await
    }
}

impl Default for TreeOfThoughts {
    fn default() -> Self {
        Self::heuristic()
    }
}
