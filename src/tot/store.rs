//! Session registry.
//!
//! The store is an explicit object handed to whoever drives exploration.
//! Each session sits behind its own lock so independent sessions never
//! contend; the map itself is a concurrent [`DashMap`].

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::types::{Session, TotConfig};
use crate::error::{ReasoningError, ReasoningResult};

/// Shared handle to one session's arena.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Short listing entry for a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub problem: String,
    pub total_nodes: usize,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

/// In-memory session registry. Sessions live until deleted or the process exits.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh root.
    ///
    /// An existing session with the same id is replaced: its arena is
    /// discarded, never merged. Callers still holding the old handle keep a
    /// detached copy that the store no longer sees.
    pub fn start_session(
        &self,
        session_id: &str,
        problem: &str,
        config: TotConfig,
    ) -> ReasoningResult<Session> {
        if session_id.trim().is_empty() {
            return Err(ReasoningError::Validation {
                field: "session_id".to_string(),
                reason: "Session ID cannot be empty".to_string(),
            });
        }
        if problem.trim().is_empty() {
            return Err(ReasoningError::Validation {
                field: "problem".to_string(),
                reason: "Problem statement cannot be empty".to_string(),
            });
        }
        config.validate()?;

        let session = Session::new(session_id, problem.trim(), config);
        let snapshot = session.clone();

        let previous = self
            .sessions
            .insert(session_id.to_string(), Arc::new(Mutex::new(session)));
        if previous.is_some() {
            info!(session_id = %session_id, "Session reset, previous tree discarded");
        } else {
            debug!(session_id = %session_id, "Session created");
        }

        Ok(snapshot)
    }

    /// Shared handle to a session.
    pub fn handle(&self, session_id: &str) -> ReasoningResult<SessionHandle> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ReasoningError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Point-in-time copy of a session.
    pub async fn get(&self, session_id: &str) -> ReasoningResult<Session> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "Session deleted");
        }
        removed
    }

    /// Summaries of all sessions, oldest first.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let session = handle.lock().await;
            summaries.push(SessionSummary {
                id: session.id.clone(),
                problem: session.problem.clone(),
                total_nodes: session.total_nodes(),
                is_complete: session.is_complete,
                created_at: session.created_at,
            });
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
