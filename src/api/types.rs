//! API request and response types

use crate::conversation::Turn;
use serde::{Deserialize, Serialize};

/// Stateless question; the caller supplies any prior history
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<Turn>,
}

/// Question within a server-side session
#[derive(Debug, Deserialize)]
pub struct SessionAskRequest {
    pub query: String,
}

/// Response with a session's history
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub history: Vec<Turn>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
