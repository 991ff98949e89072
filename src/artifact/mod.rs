//! Persisting predictor output as retrievable files.
//!
//! [`FileArtifactWriter`] stores one file per job under a configured
//! directory: `{id}.pdb` for coordinates, `{id}.rr` for contact maps.

pub mod pdb;
pub mod rr;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ContactsConfig;
use crate::jobs::{ArtifactFormat, ArtifactRef};
use crate::predictor::RawStructure;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot encode prediction: {0}")]
    Malformed(String),

    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// What a writer knows about the job it persists output for.
#[derive(Debug, Clone)]
pub struct ArtifactContext<'a> {
    pub job_id: Uuid,
    pub sequence: &'a str,
}

/// Converts raw predictor output into a durable artifact.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    async fn write(
        &self,
        ctx: ArtifactContext<'_>,
        raw: RawStructure,
    ) -> Result<ArtifactRef, WriteError>;
}

/// Writes artifacts as plain files keyed by job id.
#[derive(Debug, Clone)]
pub struct FileArtifactWriter {
    dir: PathBuf,
    contacts: ContactsConfig,
}

impl FileArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>, contacts: ContactsConfig) -> Self {
        Self {
            dir: dir.into(),
            contacts,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job_id: Uuid, format: ArtifactFormat) -> PathBuf {
        self.dir.join(format!("{job_id}.{}", format.extension()))
    }
}

#[async_trait]
impl ArtifactWriter for FileArtifactWriter {
    async fn write(
        &self,
        ctx: ArtifactContext<'_>,
        raw: RawStructure,
    ) -> Result<ArtifactRef, WriteError> {
        let (format, contents) = match raw {
            RawStructure::Pdb(text) => (ArtifactFormat::Pdb, pdb::atom_section(&text)?),
            RawStructure::Backbone(atoms) => (
                ArtifactFormat::Pdb,
                pdb::backbone_to_pdb(ctx.sequence, &atoms, pdb::DEFAULT_CHAIN)?,
            ),
            RawStructure::DistanceMap(matrix) => (
                ArtifactFormat::Rr,
                rr::contact_map(&matrix, self.contacts.threshold, self.contacts.min_separation)?,
            ),
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(ctx.job_id, format);
        tokio::fs::write(&path, contents).await?;

        tracing::debug!(job_id = %ctx.job_id, path = %path.display(), "Artifact written");
        Ok(ArtifactRef { format, path })
    }
}
