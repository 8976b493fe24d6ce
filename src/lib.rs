//! # Tree-of-Thoughts Reasoning
//!
//! A deliberate reasoning engine that explores a problem as a tree of
//! candidate thoughts. Each expansion proposes a few next thoughts, each
//! thought is scored, weak branches are pruned, and the best root-to-leaf
//! path is rendered into a plan with a confidence and alternatives.
//!
//! The engine runs in-process with deterministic heuristics, or with a
//! Langbase pipe as the thought generator. It is exposed as a library, as
//! an MCP stdio server, and as a one-shot CLI.
//!
//! ## Architecture
//!
//! ```text
//! MCP Client / CLI → TreeOfThoughts → TreeExplorer → ThoughtGenerator (heuristic | Langbase)
//!                          ↓                ↓
//!                    SessionStore      NodeEvaluator
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tot_reasoning::tot::TreeOfThoughts;
//!
//! # async fn run() -> Result<(), tot_reasoning::ReasoningError> {
//! let engine = TreeOfThoughts::heuristic();
//! let response = engine
//!     .generate_response("launch", "Plan a product launch", None)
//!     .await?;
//! println!("{}", response.primary_response);
//! # Ok(())
//! # }
//! ```

/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Langbase API client and types for pipe communication.
pub mod langbase;
/// System prompts for Langbase pipes.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// Tree-of-Thoughts engine.
pub mod tot;

pub use config::Config;
pub use error::{AppError, AppResult, ReasoningError};
pub use server::{AppState, McpServer, SharedState};
pub use tot::TreeOfThoughts;
