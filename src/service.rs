//! Submission and query API over the job store.
//!
//! [`JobService`] is what the HTTP layer talks to. It validates input,
//! allocates the job record, hands the job to the [`JobRunner`] and answers
//! status, result and history queries from the [`JobStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::FileArtifactWriter;
use crate::config::{FoldConfig, PredictorKind};
use crate::error::JobError;
use crate::jobs::{ArtifactFormat, Job, JobStatus, JobStore, JobSummary, PredictionKind};
use crate::predictor::{EsmAtlasPredictor, LocalPredictor, ModelCommand, PsiBlast, Predictor};
use crate::runner::JobRunner;

/// Contents of a completed job's artifact, keyed by format on the wire:
/// `{"pdb": "..."}` or `{"rr": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    Pdb(String),
    Rr(String),
}

impl Artifact {
    pub fn contents(&self) -> &str {
        match self {
            Artifact::Pdb(text) | Artifact::Rr(text) => text,
        }
    }
}

pub struct JobService {
    store: Arc<JobStore>,
    runner: JobRunner,
    predictors: HashMap<PredictionKind, Arc<dyn Predictor>>,
}

impl JobService {
    pub fn new(store: Arc<JobStore>, runner: JobRunner) -> Self {
        Self {
            store,
            runner,
            predictors: HashMap::new(),
        }
    }

    /// Register the predictor that serves jobs of `kind`.
    pub fn with_predictor(mut self, kind: PredictionKind, predictor: Arc<dyn Predictor>) -> Self {
        self.predictors.insert(kind, predictor);
        self
    }

    /// Wire store, runner, writer and predictors from configuration.
    ///
    /// Structure jobs use the configured predictor. Contact-map jobs are
    /// enabled whenever a local model command is configured.
    pub fn from_config(config: &FoldConfig) -> Result<Self> {
        let store = Arc::new(JobStore::new());
        let writer = Arc::new(FileArtifactWriter::new(
            config.artifact_dir.clone(),
            config.contacts.clone(),
        ));
        let runner = JobRunner::new(
            Arc::clone(&store),
            writer,
            config.max_concurrent_jobs,
            config.job_timeout(),
        );

        let local: Option<Arc<dyn Predictor>> = config.local.model_command.as_ref().map(|program| {
            let psiblast = PsiBlast {
                program: config.local.psiblast.clone(),
                program_args: config.local.psiblast_args.clone(),
                db: config.local.blast_db.clone(),
                num_iterations: config.local.num_iterations,
            };
            let model = ModelCommand {
                program: program.clone(),
                args: config.local.model_args.clone(),
            };
            Arc::new(LocalPredictor::new(psiblast, model)) as Arc<dyn Predictor>
        });

        let structure: Arc<dyn Predictor> = match config.predictor {
            PredictorKind::EsmAtlas => Arc::new(
                EsmAtlasPredictor::new(&config.esm_atlas)
                    .context("failed to build ESM Atlas client")?,
            ),
            PredictorKind::Local => match &local {
                Some(predictor) => Arc::clone(predictor),
                None => bail!("predictor = \"local\" requires [local].model_command"),
            },
        };

        let mut service =
            Self::new(store, runner).with_predictor(PredictionKind::Structure, structure);
        if let Some(local) = local {
            service = service.with_predictor(PredictionKind::Contacts, local);
        }
        Ok(service)
    }

    pub fn supports(&self, kind: PredictionKind) -> bool {
        self.predictors.contains_key(&kind)
    }

    /// Submit a structure prediction.
    pub async fn submit(&self, input: &str) -> Result<Uuid, JobError> {
        self.submit_kind(PredictionKind::Structure, input).await
    }

    /// Validate, record and dispatch a job. Returns as soon as the job is
    /// queued; the prediction runs in the background.
    pub async fn submit_kind(&self, kind: PredictionKind, input: &str) -> Result<Uuid, JobError> {
        let sequence = input.trim();
        if sequence.is_empty() {
            return Err(JobError::InvalidInput);
        }
        let predictor = self
            .predictors
            .get(&kind)
            .cloned()
            .ok_or(JobError::Unsupported(kind))?;

        let id = self.store.create(sequence.to_string(), kind).await;
        tracing::info!(job_id = %id, %kind, residues = sequence.len(), "Job submitted");

        self.runner.dispatch(id, kind, sequence.to_string(), predictor);
        Ok(id)
    }

    pub async fn get_status(&self, id: &Uuid) -> Result<JobStatus, JobError> {
        Ok(self.get_job(id).await?.status)
    }

    pub async fn get_job(&self, id: &Uuid) -> Result<Job, JobError> {
        self.store.get(id).await.ok_or(JobError::NotFound(*id))
    }

    /// Read a completed job's artifact. Anything other than `Completed`,
    /// including `Failed`, is `NotReady`.
    pub async fn get_result(&self, id: &Uuid) -> Result<Artifact, JobError> {
        let job = self.get_job(id).await?;
        let artifact = match (job.status, job.result) {
            (JobStatus::Completed, Some(artifact)) => artifact,
            (status, _) => return Err(JobError::NotReady { id: *id, status }),
        };

        let contents = tokio::fs::read_to_string(&artifact.path).await?;
        Ok(match artifact.format {
            ArtifactFormat::Pdb => Artifact::Pdb(contents),
            ArtifactFormat::Rr => Artifact::Rr(contents),
        })
    }

    pub async fn list_history(&self) -> Vec<JobSummary> {
        self.store.list_all().await
    }

    pub async fn job_count(&self) -> usize {
        self.store.len().await
    }

    /// Number of dispatched jobs that have not reached a terminal state.
    pub fn in_flight(&self) -> usize {
        self.runner.in_flight()
    }

    /// Poll until the job is terminal or `timeout` elapses, returning the
    /// latest snapshot either way.
    pub async fn wait_for(&self, id: &Uuid, timeout: Duration) -> Result<Job, JobError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.get_job(id).await?;
            if job.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait for every dispatched job to finish.
    pub async fn drain(&self) {
        self.runner.wait_idle().await;
    }

    /// Drain with an upper bound. Returns `false` if jobs were still running
    /// when the grace period ran out; jobs still queued at that point fail.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let in_flight = self.in_flight();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for running jobs to finish");
        }
        self.runner.shutdown(grace).await
    }
}
