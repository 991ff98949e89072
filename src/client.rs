//! HTTP client for a running foldjob server, used by the CLI subcommands.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::http::handlers::{StatusResponse, SubmitResponse};
use crate::jobs::{JobSummary, PredictionKind};
use crate::service::Artifact;

pub const DEFAULT_ADDR: &str = "http://127.0.0.1:5000";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status. `message` is the `error`
    /// field of the JSON body when there is one.
    #[error("server error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub struct FoldClient {
    client: Client,
    base_url: String,
}

impl FoldClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn submit(&self, kind: PredictionKind, sequence: &str) -> Result<Uuid, ClientError> {
        let route = match kind {
            PredictionKind::Structure => "submit",
            PredictionKind::Contacts => "submit_job",
        };
        let response = self
            .client
            .post(self.url(route))
            .json(&json!({ "sequence": sequence }))
            .send()
            .await?;
        let body: SubmitResponse = decode(response).await?;
        Ok(body.job_id)
    }

    pub async fn status(&self, id: &Uuid) -> Result<StatusResponse, ClientError> {
        let response = self.client.get(self.url(&format!("status/{id}"))).send().await?;
        decode(response).await
    }

    pub async fn result(&self, id: &Uuid) -> Result<Artifact, ClientError> {
        let response = self.client.get(self.url(&format!("result/{id}"))).send().await?;
        decode(response).await
    }

    pub async fn history(&self) -> Result<Vec<JobSummary>, ClientError> {
        let response = self.client.get(self.url("history")).send().await?;
        decode(response).await
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(text);
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json::<T>().await?)
}
