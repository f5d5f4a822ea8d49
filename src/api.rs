//! HTTP API for the political intelligence service

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::config::SessionLimits;
use crate::runtime::{SessionManager, SharedRuntime};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(runtime: SharedRuntime, limits: SessionLimits) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(Arc::new(runtime), limits)),
        }
    }

    pub fn runtime(&self) -> &SharedRuntime {
        self.sessions.runtime()
    }
}
