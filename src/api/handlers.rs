//! HTTP request handlers

use super::types::{AskRequest, ErrorResponse, HealthResponse, SessionAskRequest, SessionResponse};
use super::AppState;
use crate::conversation::TurnResult;
use crate::runtime::TurnError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // One-shot question with caller-held history
        .route("/api/ask", post(ask))
        // Session-scoped conversation
        .route("/api/sessions/:id/ask", post(ask_in_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/health", get(health))
        .with_state(state)
}

// ============================================================
// Questions
// ============================================================

async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<TurnResult>, AppError> {
    let query = validate_query(&req.query)?;
    let result = state
        .runtime()
        .run_turn(query, req.history, CancellationToken::new())
        .await?;
    Ok(Json(result))
}

async fn ask_in_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SessionAskRequest>,
) -> Result<Json<TurnResult>, AppError> {
    let query = validate_query(&req.query)?;
    let result = state.sessions.ask(&id, query).await?;
    Ok(Json(result))
}

fn validate_query(query: &str) -> Result<&str, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("Query must not be empty".to_string()));
    }
    Ok(query)
}

// ============================================================
// Sessions
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))?;

    Ok(Json(SessionResponse {
        id: session.id,
        history: session.history,
        created_at: session.created_at.to_rfc3339(),
        updated_at: session.updated_at.to_rfc3339(),
    }))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.sessions.remove(&id).await;
    StatusCode::NO_CONTENT
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.runtime().model_id().to_string(),
    })
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Cancelled => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
