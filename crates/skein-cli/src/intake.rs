//! Intake API - HTTP で task を受け付ける
//!
//! - `POST /tasks`: `{"due_at": RFC3339, "payload": <any JSON>}` → 201 `{"id", "status"}`
//! - `GET /tasks/{id}`: 1 件の状態
//! - `GET /stats`: status ごとの件数
//!
//! Input is validated here; the core only ever sees a well-formed `NewTask`.
//! The payload is kept as the exact JSON text the client sent (key order,
//! number precision and whitespace included).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use skein_core::domain::{NewTask, StoreError, TaskId, TaskRecord, TaskStatus};
use skein_core::ports::TaskStore;

#[derive(Clone)]
pub struct IntakeState {
    pub store: Arc<dyn TaskStore>,
}

#[derive(Deserialize)]
struct SubmitTaskRequest {
    due_at: DateTime<Utc>,
    payload: Box<RawValue>,
}

#[derive(Serialize)]
struct SubmitTaskResponse {
    id: String,
    status: &'static str,
}

#[derive(Serialize)]
struct TaskView {
    id: String,
    status: TaskStatus,
    due_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    picked_at: Option<DateTime<Utc>>,
    /// `null` when the stored bytes are not JSON.
    payload: Option<Value>,
}

impl From<TaskRecord> for TaskView {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id.to_string(),
            status: record.status,
            due_at: record.due_at,
            created_at: record.created_at,
            picked_at: record.picked_at,
            payload: serde_json::from_slice(&record.payload).ok(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

enum ApiError {
    BadRequest(String),
    NotFound(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Store(err) => {
                tracing::error!(error = %err, kind = ?err.kind(), "store request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

pub fn router(state: IntakeState) -> Router {
    Router::new()
        .route("/tasks", post(submit_task_handler))
        .route("/tasks/{id}", get(get_task_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    state: IntakeState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "intake API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn submit_task_handler(
    State(state): State<IntakeState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // どんな decode 失敗も 400（Json extractor の 415/422 は使わない）
    let req: SubmitTaskRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(format!("invalid JSON: {err}")))?;
    let payload = req.payload.get().as_bytes().to_vec();

    let id = state.store.submit(NewTask::new(req.due_at, payload)).await?;
    tracing::info!(task_id = %id, due_at = %req.due_at, "task submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitTaskResponse {
            id: id.to_string(),
            status: "created",
        }),
    ))
}

async fn get_task_handler(
    State(state): State<IntakeState>,
    Path(raw_id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let id: TaskId = raw_id
        .parse()
        .map_err(|err| ApiError::BadRequest(format!("{err}")))?;

    match state.store.get(id).await? {
        Some(record) => Ok(Json(TaskView::from(record))),
        None => Err(ApiError::NotFound(format!("task {id} not found"))),
    }
}

async fn stats_handler(State(state): State<IntakeState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.counts().await?))
}
