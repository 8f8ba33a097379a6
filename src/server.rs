//! JSON HTTP API for the library front end.
//!
//! Every request authenticates with `Authorization: Bearer <LLM API key>`.
//! A fresh [`Session`] is built from that header for each request, so no
//! user state is kept between requests.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/me` | Fingerprint and library file name |
//! | `GET`  | `/topics` | Bookshelf vocabulary |
//! | `POST` | `/analyze` | Run an analysis, return the cleaned draft |
//! | `GET`  | `/library?q=` | Records, newest first, optionally filtered |
//! | `POST` | `/library` | Append a record |
//! | `DELETE` | `/library/{position}` | Delete the record at a stored position |
//! | `GET`  | `/library/export` | Library as a CSV download |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "conflict", "message": "version conflict on ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `timeout` (408), `conflict` (409), `internal` (500), `upstream_error` (502).

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Local;
use material_library_core::merge::MergeError;
use material_library_core::models::{LibraryRecord, RecordError, Topics};
use material_library_core::store::StoreError;
use material_library_core::{codec, store::read_library};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analysis::{AnalysisError, AnalysisRequest};
use crate::backend::Backend;
use crate::config::Config;
use crate::export::default_export_name;
use crate::llm::LlmError;
use crate::session::Session;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    backend: Arc<Backend>,
}

/// Start the HTTP server on `[server].bind`.
pub async fn run_server(config: &Config, backend: Arc<Backend>) -> anyhow::Result<()> {
    let app = router(Arc::new(config.clone()), backend);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Material library listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(config: Arc<Config>, backend: Arc<Backend>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/me", get(handle_me))
        .route("/topics", get(handle_topics))
        .route("/analyze", post(handle_analyze))
        .route("/library", get(handle_list).post(handle_append))
        .route("/library/export", get(handle_export))
        .route("/library/{position}", delete(handle_delete))
        .layer(cors)
        .with_state(AppState { config, backend })
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
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn upstream(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_GATEWAY, "upstream_error", message)
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Conflict { .. } => AppError::new(StatusCode::CONFLICT, "conflict", message),
            StoreError::Unauthorized(_) | StoreError::Transport(_) => upstream(message),
            StoreError::Encoding(_) | StoreError::Io(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        bad_request(err.to_string())
    }
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::PositionOutOfRange { .. } => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            MergeError::Store(e) => e.into(),
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let message = err.to_string();
        match err {
            AnalysisError::MissingSourceText | AnalysisError::NoTopics => bad_request(message),
            AnalysisError::MissingCredential => unauthorized(message),
            AnalysisError::Llm(LlmError::Unauthorized(_)) => unauthorized(message),
            AnalysisError::Llm(LlmError::Timeout(_)) => {
                AppError::new(StatusCode::REQUEST_TIMEOUT, "timeout", message)
            }
            AnalysisError::Llm(_) => upstream(message),
        }
    }
}

/// Build the request's session from its bearer credential.
fn session_from(headers: &HeaderMap) -> Result<Session, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing Authorization header"))?;
    let key = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Authorization must be a Bearer credential"))?;
    Session::login(key).map_err(|e| unauthorized(e.to_string()))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /me ============

#[derive(Serialize)]
struct MeResponse {
    fingerprint: String,
    file: String,
    backend: String,
}

async fn handle_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AppError> {
    let session = session_from(&headers)?;
    Ok(Json(MeResponse {
        fingerprint: session.user().to_string(),
        file: session.file_name(),
        backend: state.backend.store.backend().to_string(),
    }))
}

// ============ GET /topics ============

#[derive(Serialize)]
struct TopicsResponse {
    topics: Vec<String>,
}

async fn handle_topics(State(state): State<AppState>) -> Json<TopicsResponse> {
    Json(TopicsResponse {
        topics: state.backend.bookshelf.list_topics().await,
    })
}

// ============ POST /analyze ============

#[derive(Serialize)]
struct AnalyzeResponse {
    analysis: String,
}

async fn handle_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let session = session_from(&headers)?;
    let analysis = session.analyze(&state.config.llm, &request).await?;
    Ok(Json(AnalyzeResponse { analysis }))
}

// ============ GET /library ============

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct ListedRecord {
    position: usize,
    #[serde(flatten)]
    record: LibraryRecord,
    /// Split topic labels; `null` when the row predates the topic column.
    topics: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ListResponse {
    total: usize,
    records: Vec<ListedRecord>,
}

async fn handle_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let mut session = session_from(&headers)?;
    let library = session.load(state.backend.store.as_ref()).await;
    let records = library
        .search(query.q.trim())
        .into_iter()
        .map(|(position, record)| ListedRecord {
            position,
            topics: match record.topics() {
                Topics::Known(t) => Some(t),
                Topics::Unknown => None,
            },
            record: record.clone(),
        })
        .collect();
    Ok(Json(ListResponse {
        total: library.len(),
        records,
    }))
}

// ============ POST /library ============

#[derive(Deserialize)]
struct NewRecord {
    #[serde(default)]
    title: String,
    topics: Vec<String>,
    analysis: String,
    source_text: String,
}

#[derive(Serialize)]
struct WriteResponse {
    total: usize,
}

async fn handle_append(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(new): Json<NewRecord>,
) -> Result<Json<WriteResponse>, AppError> {
    let mut session = session_from(&headers)?;
    let record = LibraryRecord::new(
        Local::now().date_naive(),
        &new.title,
        &new.topics,
        &new.analysis,
        &new.source_text,
    )?;
    let library = session.save(state.backend.store.as_ref(), record).await?;
    Ok(Json(WriteResponse {
        total: library.len(),
    }))
}

// ============ DELETE /library/{position} ============

async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(position): Path<usize>,
) -> Result<Json<WriteResponse>, AppError> {
    let mut session = session_from(&headers)?;
    let library = session.delete(state.backend.store.as_ref(), position).await?;
    Ok(Json(WriteResponse {
        total: library.len(),
    }))
}

// ============ GET /library/export ============

async fn handle_export(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = session_from(&headers)?;
    let (library, _) = read_library(state.backend.store.as_ref(), session.user()).await;
    let bytes = codec::encode(&library).map_err(StoreError::from)?;
    // Header values must be ASCII; the dated name goes in `filename*`.
    let name = default_export_name(Local::now().date_naive());
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        session.file_name(),
        urlencoding::encode(&name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
