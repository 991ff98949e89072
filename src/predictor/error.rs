//! Error types for structure predictors.
//!
//! Every variant ends up as the `error` text of a failed job, so the
//! `Display` output is written for an end user polling `/status`.

use thiserror::Error;

/// Failures a [`Predictor`](super::Predictor) can report.
#[derive(Debug, Error)]
pub enum PredictorError {
    /// The remote folding service answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// DNS, connection refused, timeouts and other transport failures.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// An external tool ran but exited unsuccessfully.
    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// An external tool could not be started at all.
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed predictor output: {0}")]
    MalformedOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = PredictorError::ApiError {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "API error (status 503): Service Unavailable");
    }

    #[test]
    fn tool_failed_display() {
        let err = PredictorError::ToolFailed {
            tool: "psiblast".into(),
            status: "exit status: 1".into(),
            stderr: "BLAST Database error".into(),
        };
        assert_eq!(
            err.to_string(),
            "psiblast failed (exit status: 1): BLAST Database error"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PredictorError>();
    }
}
