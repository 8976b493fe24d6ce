//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::config::Config;
use crate::tot::TreeOfThoughts;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Reasoning engine and its session store.
    pub engine: TreeOfThoughts,
}

impl AppState {
    pub fn new(config: Config, engine: TreeOfThoughts) -> Self {
        tracing::info!(
            generator = ?config.reasoning.generator,
            max_depth = engine.defaults().max_depth,
            branching_factor = engine.defaults().branching_factor,
            strategy = %engine.defaults().search_strategy,
            "AppState initialized"
        );
        Self { config, engine }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
