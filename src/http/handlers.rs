//! Route handlers. Each one is a thin translation between JSON and
//! [`JobService`](crate::service::JobService) calls.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use super::error::{AppError, AppResult};
use crate::jobs::{JobStatus, JobSummary, PredictionKind};
use crate::service::Artifact;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Missing is treated like empty and rejected by the service.
    #[serde(default)]
    pub sequence: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs known to this process.
    pub jobs: usize,
}

/// POST /submit -- queue a structure prediction.
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> AppResult<Json<SubmitResponse>> {
    submit_as(&state, PredictionKind::Structure, body).await
}

/// POST /submit_job -- queue a contact-map prediction.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> AppResult<Json<SubmitResponse>> {
    submit_as(&state, PredictionKind::Contacts, body).await
}

async fn submit_as(
    state: &AppState,
    kind: PredictionKind,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> AppResult<Json<SubmitResponse>> {
    let Json(request) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let job_id = state.service.submit_kind(kind, &request.sequence).await?;
    Ok(Json(SubmitResponse { job_id }))
}

/// GET /status/{job_id}
pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    let id = parse_job_id(&job_id)?;
    let job = state.service.get_job(&id).await?;
    Ok(Json(StatusResponse {
        job_id: job.id,
        status: job.status,
        error: job.error,
    }))
}

/// GET /result/{job_id} -- `{"pdb": ...}` or `{"rr": ...}` once completed.
pub async fn result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Artifact>> {
    let id = parse_job_id(&job_id)?;
    Ok(Json(state.service.get_result(&id).await?))
}

/// GET /history -- every job, oldest first.
pub async fn history(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    Json(state.service.list_history().await)
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        jobs: state.service.job_count().await,
    })
}

/// Ids that are not UUIDs can never name a job, so they are simply unknown.
fn parse_job_id(raw: &str) -> AppResult<Uuid> {
    raw.parse()
        .map_err(|_| AppError::UnknownJob(raw.to_string()))
}
