//! HTTP edge for docuchat.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/upload-complete` | Upload-completion event; ingestion runs in the background, 202 ack |
//! | `POST` | `/api/message` | Ask a question about an owned file; 200 with a streamed text body |
//! | `GET`  | `/api/files/{id}/messages` | Recent conversation turns, newest first |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses are JSON:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "file not found" } }
//! ```
//!
//! Codes: `unauthorized` (401), `not_found` (404), `bad_request` (400),
//! `internal` (500). A file owned by another user returns `not_found`, not
//! `unauthorized`, so ownership cannot be probed.
//!
//! Identity comes from an `Authorization: Bearer` token signed with
//! `DOCUCHAT_SESSION_SECRET` (see [`crate::auth`]).

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer;
use crate::auth::{self, Identity};
use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::error::ChatError;
use crate::ingest;
use crate::llm::{self, LanguageModel};
use crate::migrate;
use crate::models::UploadEvent;
use crate::store;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pool: sqlx::SqlitePool,
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    session_secret: Arc<Vec<u8>>,
}

/// Start the HTTP server on the configured bind address.
///
/// Runs migrations first (idempotent), then serves until the process is
/// terminated. Requires `DOCUCHAT_SESSION_SECRET` and `OPENAI_API_KEY` in
/// the environment.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let session_secret = std::env::var("DOCUCHAT_SESSION_SECRET")
        .map_err(|_| anyhow::anyhow!("DOCUCHAT_SESSION_SECRET environment variable not set"))?;

    let pool = db::connect(&config.db).await?;
    migrate::run_migrations(&pool).await?;

    let embedder: Arc<dyn Embedder> = embedding::create_embedder(&config.embedding)?.into();
    let model: Arc<dyn LanguageModel> = llm::create_language_model(&config.llm)?.into();

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        embedder,
        llm: model,
        session_secret: Arc::new(session_secret.into_bytes()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/upload-complete", post(handle_upload_complete))
        .route("/api/message", post(handle_message))
        .route("/api/files/{id}/messages", get(handle_list_messages))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = config.server.bind.clone();
    tracing::info!(bind = %bind_addr, "server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: "missing or invalid credentials".to_string(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: "file not found".to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Unauthorized => AppError::unauthorized(),
            ChatError::NotFound => AppError::not_found(),
            // Chat failures surface as a generic retryable notice; provider
            // detail stays in the logs.
            ChatError::Stream(detail) | ChatError::Persistence(detail) => {
                tracing::error!(error = %detail, "chat request failed");
                AppError::internal("something went wrong, please retry")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ Handlers ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Upload-completion events get a best-effort ack regardless of how
/// ingestion turns out; the outcome is visible only as the file status.
async fn handle_upload_complete(
    State(state): State<AppState>,
    Json(event): Json<UploadEvent>,
) -> (StatusCode, Json<serde_json::Value>) {
    tokio::spawn(async move {
        if let Err(e) =
            ingest::run_ingest(&state.pool, &state.config, state.embedder.as_ref(), &event).await
        {
            tracing::error!(key = %event.storage_key, error = %e, "ingestion aborted");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true })),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    file_id: String,
    message: String,
}

async fn handle_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let identity = require_identity(&headers, &state.session_secret)?;

    if request.message.trim().is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }

    let stream = answer::answer(
        &state.pool,
        state.embedder.as_ref(),
        state.llm.clone(),
        &state.config.retrieval,
        &identity.user_id,
        &request.file_id,
        &request.message,
    )
    .await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(response)
}

#[derive(Deserialize)]
struct ListMessagesParams {
    limit: Option<i64>,
}

async fn handle_list_messages(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(params): Query<ListMessagesParams>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = require_identity(&headers, &state.session_secret)?;

    let file = store::find_file(&state.pool, &file_id, &identity.user_id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .ok_or_else(AppError::not_found)?;

    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let messages = store::list_recent_messages(&state.pool, &file.id, limit)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(serde_json::json!({ "messages": messages })))
}

fn require_identity(headers: &HeaderMap, secret: &[u8]) -> Result<Identity, ChatError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ChatError::Unauthorized)?;

    auth::verify_token(secret, token).ok_or(ChatError::Unauthorized)
}
