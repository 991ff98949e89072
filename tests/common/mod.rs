#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use foldjob::artifact::FileArtifactWriter;
use foldjob::config::FoldConfig;
use foldjob::http::build_app_router;
use foldjob::jobs::{JobStore, PredictionKind};
use foldjob::predictor::{Predictor, PredictorError, RawStructure};
use foldjob::runner::JobRunner;
use foldjob::service::JobService;

pub const PDB: &str = "ATOM      1  N   MET A   1      11.104   6.134  -6.504  1.00  0.00           N\nEND\n";

/// Predictor with canned behaviour for driving the router.
pub enum Stub {
    Pdb,
    Distances,
    Fail,
    Slow(Duration),
}

#[async_trait]
impl Predictor for Stub {
    fn name(&self) -> &str {
        "stub"
    }

    async fn predict(&self, sequence: &str) -> Result<RawStructure, PredictorError> {
        match self {
            Stub::Pdb => Ok(RawStructure::Pdb(PDB.to_string())),
            Stub::Distances => {
                let n = sequence.len();
                let mut matrix = vec![vec![20.0; n]; n];
                if n > 6 {
                    matrix[0][6] = 4.5;
                }
                Ok(RawStructure::DistanceMap(matrix))
            }
            Stub::Fail => Err(PredictorError::ApiError {
                status: 503,
                message: "Service Unavailable".into(),
            }),
            Stub::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(RawStructure::Pdb(PDB.to_string()))
            }
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub service: Arc<JobService>,
    _dir: tempfile::TempDir,
}

/// Build the full router, with the production middleware stack, around a
/// service using the given structure predictor and optional contacts one.
pub fn build_test_app(structure: Stub, contacts: Option<Stub>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = FoldConfig {
        artifact_dir: dir.path().to_path_buf(),
        ..FoldConfig::default()
    };

    let store = Arc::new(JobStore::new());
    let writer = Arc::new(FileArtifactWriter::new(
        config.artifact_dir.clone(),
        config.contacts.clone(),
    ));
    let runner = JobRunner::new(Arc::clone(&store), writer, 4, config.job_timeout());
    let mut service = JobService::new(store, runner)
        .with_predictor(PredictionKind::Structure, Arc::new(structure));
    if let Some(contacts) = contacts {
        service = service.with_predictor(PredictionKind::Contacts, Arc::new(contacts));
    }
    let service = Arc::new(service);

    TestApp {
        router: build_app_router(Arc::clone(&service), &config).unwrap(),
        service,
        _dir: dir,
    }
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn post_raw(app: &TestApp, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, &body.to_string()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
