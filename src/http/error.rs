use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::JobError;

/// Error type for HTTP handlers.
///
/// Wraps [`JobError`] for service errors and renders every error as
/// `{"error": message, "code": CODE}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Job(#[from] JobError),

    /// Request body that could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Path segment that is not a job id.
    #[error("Job not found: {0}")]
    UnknownJob(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Job(err) => match err {
                JobError::InvalidInput => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", err.to_string())
                }
                JobError::Unsupported(_) => {
                    (StatusCode::BAD_REQUEST, "UNSUPPORTED", err.to_string())
                }
                JobError::NotReady { .. } => {
                    (StatusCode::BAD_REQUEST, "NOT_READY", "Not ready".to_string())
                }
                JobError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                JobError::InvalidTransition { .. } | JobError::Artifact(_) => {
                    tracing::error!(error = %err, "Internal job error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::UnknownJob(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
