//! HTTP front end.
//!
//! [`build_app_router`] is shared by [`serve`] and the integration tests so
//! both exercise the same middleware stack.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::FoldConfig;
use crate::service::JobService;

/// How long a shutdown waits for running predictions before giving up.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<JobService>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/submit", post(handlers::submit))
        .route("/submit_job", post(handlers::submit_job))
        .route("/status/{job_id}", get(handlers::status))
        .route("/result/{job_id}", get(handlers::result))
        .route("/history", get(handlers::history))
        .route("/health", get(handlers::health))
}

/// Build the full application [`Router`] with all middleware layers.
///
/// Layers apply bottom-up: CORS, request id, tracing, request id
/// propagation, timeout, panic recovery.
pub fn build_app_router(service: Arc<JobService>, config: &FoldConfig) -> Result<Router> {
    let cors = build_cors_layer(&config.cors_origins)?;
    let request_id_header = HeaderName::from_static("x-request-id");

    Ok(routes()
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(AppState { service }))
}

/// CORS for the configured origins. `"*"` anywhere in the list allows any
/// origin; otherwise every entry must be a valid origin.
pub fn build_cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if origins.iter().any(|o| o.trim() == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin '{o}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(origins))
}

/// Bind, serve until SIGINT/SIGTERM, then drain running jobs.
pub async fn serve(service: Arc<JobService>, config: &FoldConfig) -> Result<()> {
    let app = build_app_router(Arc::clone(&service), config)?;

    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("invalid host address '{}'", config.host))?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(
        %addr,
        artifact_dir = %config.artifact_dir.display(),
        max_concurrent_jobs = config.max_concurrent_jobs,
        "Starting server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped accepting connections");
    if service.shutdown(SHUTDOWN_GRACE).await {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!(
            in_flight = service.in_flight(),
            "Shutdown grace period elapsed with jobs still running"
        );
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_is_accepted() {
        assert!(build_cors_layer(&["*".to_string()]).is_ok());
        assert!(build_cors_layer(&["http://localhost:5173".to_string(), " * ".to_string()]).is_ok());
    }

    #[test]
    fn explicit_origins_must_be_valid() {
        assert!(build_cors_layer(&["http://localhost:5173".to_string()]).is_ok());
        let err = build_cors_layer(&["bad\norigin".to_string()]).unwrap_err();
        assert!(err.to_string().contains("invalid CORS origin"));
    }
}
