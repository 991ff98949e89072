use thiserror::Error;
use uuid::Uuid;

use crate::jobs::{JobStatus, PredictionKind};

/// Errors returned synchronously by the job service and store.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Missing sequence")]
    InvalidInput,

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {id} is not ready (status: {status})")]
    NotReady { id: Uuid, status: JobStatus },

    #[error("No predictor configured for {0} jobs")]
    Unsupported(PredictionKind),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Failed to read artifact: {0}")]
    Artifact(#[from] std::io::Error),
}
