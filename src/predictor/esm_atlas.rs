use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use super::error::PredictorError;
use super::{Predictor, RawStructure};
use crate::config::EsmAtlasConfig;

pub const DEFAULT_URL: &str = "https://api.esmatlas.com/foldSequence/v1/pdb/";

/// Folds sequences through the ESM Metagenomic Atlas web API.
pub struct EsmAtlasPredictor {
    client: Client,
    url: String,
}

impl EsmAtlasPredictor {
    pub fn new(config: &EsmAtlasConfig) -> Result<Self, PredictorError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Create a predictor pointing at a custom URL (useful for testing).
    pub fn with_url(url: impl Into<String>) -> Result<Self, PredictorError> {
        let config = EsmAtlasConfig {
            url: url.into(),
            ..EsmAtlasConfig::default()
        };
        Self::new(&config)
    }
}

#[async_trait]
impl Predictor for EsmAtlasPredictor {
    fn name(&self) -> &str {
        "esm_atlas"
    }

    async fn predict(&self, sequence: &str) -> Result<RawStructure, PredictorError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain")
            .body(sequence.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(PredictorError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(PredictorError::MalformedOutput(
                "folding service returned an empty body".into(),
            ));
        }
        Ok(RawStructure::Pdb(body))
    }
}
