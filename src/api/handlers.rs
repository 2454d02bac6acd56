//! HTTP request handlers

use super::assets::{serve_index, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, CreateSessionResponse, ErrorResponse, ReplayRequest,
    SearchModeRequest, SearchModeResponse, SessionResponse, SuccessResponse, UsageResponse,
};
use super::AppState;
use crate::agent::StepEvent;
use crate::session::Session;
use crate::transcript::TranscriptSnapshot;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/assets/*path", get(serve_static))
        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/clear", post(clear_session))
        .route("/api/sessions/:id/close", post(close_session))
        .route("/api/sessions/:id/search_mode", post(set_search_mode))
        // Trace export and replay
        .route("/api/sessions/:id/steps", get(get_steps))
        .route("/api/sessions/:id/replay", post(replay_steps))
        // Search provider account
        .route("/api/usage", get(get_usage))
        .route("/version", get(get_version))
        .with_state(state)
}

async fn find_session(state: &AppState, id: &str) -> Result<Arc<Session>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

fn session_response(session: &Session, snapshot: TranscriptSnapshot) -> SessionResponse {
    SessionResponse {
        id: session.id().to_string(),
        created_at: session.created_at().to_rfc3339(),
        verbose: snapshot.verbose,
        quiet: snapshot.quiet,
        running: session.is_running(),
    }
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session = state.sessions.create().await;
    Json(CreateSessionResponse {
        id: session.id().to_string(),
        model: state.sessions.model_id().to_string(),
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(session_response(&session, session.snapshot())))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, &id).await?;
    // Subscribe before building init so no update falls in between
    let rx = session.subscribe();
    Ok(sse_stream(session.init_event(), rx))
}

// ============================================================
// User actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }
    let session = find_session(&state, &id).await?;

    // Outcome reaches the client over SSE; runs on one session queue on its lock
    tokio::spawn(async move {
        if let Err(e) = session.interact(&text).await {
            tracing::debug!(session_id = %session.id(), error = %e, "interaction ended with error");
        }
    });

    Ok(Json(ChatResponse { queued: true }))
}

async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    find_session(&state, &id).await?.clear().await;
    Ok(Json(SuccessResponse { success: true }))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.remove(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

async fn set_search_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SearchModeRequest>,
) -> Result<Json<SearchModeResponse>, AppError> {
    let session = find_session(&state, &id).await?;
    let (search_advanced, extract_advanced) = session
        .set_search_modes(req.search_advanced, req.extract_advanced)
        .await;
    Ok(Json(SearchModeResponse {
        search_advanced,
        extract_advanced,
    }))
}

// ============================================================
// Trace export and replay
// ============================================================

async fn get_steps(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StepEvent>>, AppError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(session.steps().await))
}

async fn replay_steps(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReplayRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = find_session(&state, &id).await?;
    let snapshot = session
        .replay(req.events)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(session_response(&session, snapshot)))
}

// ============================================================
// Usage and version
// ============================================================

async fn get_usage(State(state): State<AppState>) -> Result<Json<UsageResponse>, AppError> {
    let report = state.sessions.search().usage().await.map_err(|e| {
        tracing::error!(error = %e, auth = e.is_auth(), "usage request failed");
        AppError::Upstream(e.to_string())
    })?;
    Ok(Json(UsageResponse {
        summary: report.to_string(),
        plan_usage: report.plan_usage,
        plan_limit: report.plan_limit,
    }))
}

async fn get_version() -> &'static str {
    concat!("smolalbert ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    /// The search provider rejected or failed a direct call
    Upstream(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
