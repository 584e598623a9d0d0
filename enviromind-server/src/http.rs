//! EnviroMind HTTP REST API
//!
//! Axum-based HTTP server for asking questions and browsing past answers.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function taking the injected state directly. The inner functions are
//! testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /               liveness banner
//! - GET  /healthz        health check
//! - POST /api/chat       ask a question, store and return the answer
//! - GET  /api/chat       every stored record, newest first
//! - GET  /api/chat/:id   one stored record

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use enviromind_core::config::HttpConfig;
use enviromind_core::models::chat::EMPTY_QUESTION;
use enviromind_core::{Assistant, ChatRecord, ChatRequest, ChatResponse, ChatStore, NewChatRecord};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cors::cors_layer;

pub const INVALID_CHAT_ID: &str = "Invalid chat ID format";
pub const CHAT_NOT_FOUND: &str = "Chat not found";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<dyn ChatStore>,
    pub assistant: Arc<dyn Assistant>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/chat", get(list_chats_handler).post(create_chat_handler))
        .route("/chat/:id", get(get_chat_handler));

    Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(healthz_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state, cors_layer(config));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("EnviroMind HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

/// Error body, `{"detail": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    /// Cause is logged, never sent to the caller.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> &'static str {
        match self {
            ApiError::Validation(msg) | ApiError::NotFound(msg) => *msg,
            ApiError::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.detail().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner root banner (pure, no IO).
pub fn root_inner() -> serde_json::Value {
    serde_json::json!({ "message": "AI Chat API is running" })
}

/// Inner health check (pure, no IO).
pub fn healthz_inner() -> serde_json::Value {
    serde_json::json!({ "status": "ok" })
}

/// Inner create: validate, ask the assistant, persist, respond.
///
/// `None` means the body could not be parsed as a `ChatRequest`.
pub async fn create_chat_inner(
    state: &HttpState,
    req: Option<ChatRequest>,
) -> Result<ChatResponse, ApiError> {
    let question = req
        .as_ref()
        .and_then(ChatRequest::trimmed_question)
        .ok_or(ApiError::Validation(EMPTY_QUESTION))?;

    let reply = state.assistant.respond(question).await;
    if reply.is_degraded() {
        tracing::warn!(
            assistant = state.assistant.name(),
            "Storing fallback answer for degraded reply"
        );
    }

    let record = state
        .store
        .insert(NewChatRecord::now(question, reply.into_text()))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, store = state.store.name(), "Error creating chat");
            ApiError::Internal(e.into())
        })?;

    tracing::info!(id = %record.id, "Chat created");
    Ok(ChatResponse::from(&record))
}

/// Inner list: all records, newest first.
pub async fn list_chats_inner(store: &dyn ChatStore) -> Result<Vec<ChatRecord>, ApiError> {
    store.list().await.map_err(|e| {
        tracing::error!(error = %e, store = store.name(), "Error retrieving chats");
        ApiError::Internal(e.into())
    })
}

/// Inner get: validate the id format before touching storage.
pub async fn get_chat_inner(store: &dyn ChatStore, raw_id: &str) -> Result<ChatRecord, ApiError> {
    let id = store
        .parse_id(raw_id)
        .ok_or(ApiError::Validation(INVALID_CHAT_ID))?;

    match store.find(&id).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(ApiError::NotFound(CHAT_NOT_FOUND)),
        Err(e) => {
            tracing::error!(error = %e, chat_id = %id, "Error retrieving chat");
            Err(ApiError::Internal(e.into()))
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(healthz_inner()))
}

pub async fn create_chat_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let req = match payload {
        Ok(Json(req)) => Some(req),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected chat request body");
            None
        }
    };
    create_chat_inner(&state, req).await.map(Json)
}

pub async fn list_chats_handler(
    State(state): State<Arc<HttpState>>,
) -> Result<Json<Vec<ChatRecord>>, ApiError> {
    list_chats_inner(state.store.as_ref()).await.map(Json)
}

pub async fn get_chat_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> Result<Json<ChatRecord>, ApiError> {
    get_chat_inner(state.store.as_ref(), &id).await.map(Json)
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
