use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Tracks the lifecycle status of a job.
///
/// Jobs flow through: Queued → Processing → {Completed, Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `Completed` and `Failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "Queued"),
            JobStatus::Processing => write!(f, "Processing"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Which structural artifact a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    /// Backbone or full-atom coordinates, persisted as a PDB file.
    Structure,
    /// Residue-residue contact map, persisted as an RR file.
    Contacts,
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionKind::Structure => write!(f, "structure"),
            PredictionKind::Contacts => write!(f, "contacts"),
        }
    }
}

/// Format of a persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Pdb,
    Rr,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Pdb => "pdb",
            ArtifactFormat::Rr => "rr",
        }
    }
}

/// Pointer to the file an artifact writer produced for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub format: ArtifactFormat,
    pub path: PathBuf,
}

/// A state change requested by a job's runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The runner picked the job up.
    Start,
    /// The pipeline produced an artifact.
    Complete(ArtifactRef),
    /// The pipeline failed; the message is kept on the record.
    Fail(String),
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Start => JobStatus::Processing,
            Transition::Complete(_) => JobStatus::Completed,
            Transition::Fail(_) => JobStatus::Failed,
        }
    }
}

/// One submitted sequence and its tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: PredictionKind,
    pub sequence: String,
    pub status: JobStatus,
    pub result: Option<ArtifactRef>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: Uuid, kind: PredictionKind, sequence: String) -> Self {
        Self {
            id,
            kind,
            sequence,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Apply a transition, refusing anything that would leave a terminal
    /// state or skip `Processing` on the way to `Completed`.
    pub fn apply(&mut self, transition: Transition) -> Result<(), JobError> {
        let next = transition.target();
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        match transition {
            Transition::Start => self.started_at = Some(now),
            Transition::Complete(artifact) => {
                self.result = Some(artifact);
                self.finished_at = Some(now);
            }
            Transition::Fail(message) => {
                self.error = Some(message);
                self.finished_at = Some(now);
            }
        }
        self.status = next;
        Ok(())
    }

    /// Wall-clock time from submission to the terminal transition.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.created_at).num_milliseconds())
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// History entry reported by `/history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}
