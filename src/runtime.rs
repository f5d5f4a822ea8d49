//! Runtime for executing turns
//!
//! `TurnRuntime` runs a single turn. `SessionManager` keeps per-session
//! history between turns so a caller can hold a conversation. Sessions are
//! bounded: idle ones expire, and the least recently used idle one makes room
//! when the cap is reached.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{TurnError, TurnRuntime};
pub use traits::*;

use crate::config::SessionLimits;
use crate::conversation::{Turn, TurnResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Runtime over boxed collaborators, as wired by `main` and the API
pub type SharedRuntime = TurnRuntime<Arc<dyn LlmClient>, Arc<dyn SearchClient>>;

/// Snapshot of a session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

struct SessionEntry {
    /// Cancels whichever turn is running for this session
    cancel: CancellationToken,
    /// Held for the whole turn, so turns within one session run in order
    turn: Mutex<()>,
    session: RwLock<Session>,
}

/// Manager for all sessions
pub struct SessionManager {
    runtime: Arc<SharedRuntime>,
    limits: SessionLimits,
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl SessionManager {
    pub fn new(runtime: Arc<SharedRuntime>, limits: SessionLimits) -> Self {
        Self {
            runtime,
            limits,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn runtime(&self) -> &SharedRuntime {
        &self.runtime
    }

    /// Run a turn within a session, creating the session on first use
    pub async fn ask(&self, session_id: &str, query: &str) -> Result<TurnResult, TurnError> {
        let entry = self.get_or_create(session_id).await;
        let _turn = entry.turn.lock().await;
        let history = entry.session.read().await.history.clone();

        let result = self
            .runtime
            .run_turn(query, history, entry.cancel.child_token())
            .await?;

        let mut session = entry.session.write().await;
        session.history.clone_from(&result.history);
        session.updated_at = Utc::now();
        tracing::debug!(
            session_id,
            history_turns = session.history.len(),
            "Session history updated"
        );
        Ok(result)
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        let entry = self.sessions.read().await.get(session_id).cloned()?;
        let session = entry.session.read().await.clone();
        Some(session)
    }

    /// Drop a session, cancelling any turn still running in it
    pub async fn remove(&self, session_id: &str) -> bool {
        match self.sessions.write().await.remove(session_id) {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::info!(session_id, "Session removed");
                true
            }
            None => false,
        }
    }

    async fn get_or_create(&self, session_id: &str) -> Arc<SessionEntry> {
        if let Some(entry) = self.sessions.read().await.get(session_id) {
            return entry.clone();
        }

        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(session_id) {
            return entry.clone();
        }
        self.evict(&mut sessions).await;

        tracing::info!(session_id, "Creating session");
        let entry = Arc::new(SessionEntry {
            cancel: CancellationToken::new(),
            turn: Mutex::new(()),
            session: RwLock::new(Session::new(session_id)),
        });
        sessions.insert(session_id.to_string(), entry.clone());
        entry
    }

    /// Drop expired sessions, then the least recently updated ones until a
    /// new session fits under the cap. Sessions with a turn in flight stay.
    async fn evict(&self, sessions: &mut HashMap<String, Arc<SessionEntry>>) {
        let now = Utc::now();
        let mut idle: Vec<(DateTime<Utc>, String)> = Vec::new();
        for (id, entry) in &*sessions {
            if entry.turn.try_lock().is_err() {
                continue;
            }
            idle.push((entry.session.read().await.updated_at, id.clone()));
        }
        idle.sort();

        let mut excess = (sessions.len() + 1).saturating_sub(self.limits.max_sessions);
        for (updated_at, id) in idle {
            let expired = now
                .signed_duration_since(updated_at)
                .to_std()
                .is_ok_and(|age| age > self.limits.idle_ttl);
            if !expired && excess == 0 {
                break;
            }
            sessions.remove(&id);
            excess = excess.saturating_sub(1);
            tracing::info!(session_id = %id, expired, "Session evicted");
        }

        if excess > 0 {
            tracing::warn!(
                sessions = sessions.len(),
                max_sessions = self.limits.max_sessions,
                "Every session is busy; exceeding the session cap"
            );
        }
    }
}
