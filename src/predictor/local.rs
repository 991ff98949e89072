use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::error::PredictorError;
use super::psiblast::{PsiBlast, PssmRow, parse_ascii_pssm};
use super::{BackboneAtom, Predictor, RawStructure};

/// External model process fed with a PSSM on stdin.
///
/// The process receives `{"sequence": "...", "pssm": [[...20 scores...], ...]}`
/// and must print either `{"distances": [[...]]}` or `{"backbone": [[x, y, z, occ, b], ...]}`.
#[derive(Debug, Clone)]
pub struct ModelCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Serialize)]
struct ModelInput<'a> {
    sequence: &'a str,
    pssm: &'a [PssmRow],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ModelOutput {
    Distances(Vec<Vec<f32>>),
    Backbone(Vec<BackboneAtom>),
}

impl ModelCommand {
    pub async fn run(&self, sequence: &str, pssm: &[PssmRow]) -> Result<RawStructure, PredictorError> {
        let payload = serde_json::to_vec(&ModelInput { sequence, pssm })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PredictorError::Spawn {
                tool: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            // Dropping stdin closes the pipe so the model sees EOF.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(PredictorError::ToolFailed {
                tool: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let parsed: ModelOutput = serde_json::from_slice(&output.stdout)?;
        match parsed {
            ModelOutput::Distances(matrix) => {
                check_square(&matrix, sequence.chars().count())?;
                Ok(RawStructure::DistanceMap(matrix))
            }
            ModelOutput::Backbone(atoms) => Ok(RawStructure::Backbone(atoms)),
        }
    }
}

fn check_square(matrix: &[Vec<f32>], residues: usize) -> Result<(), PredictorError> {
    if matrix.len() != residues || matrix.iter().any(|row| row.len() != residues) {
        return Err(PredictorError::MalformedOutput(format!(
            "expected a {residues}x{residues} distance matrix, got {} rows",
            matrix.len()
        )));
    }
    Ok(())
}

/// PSI-BLAST profile followed by a local model: sequence → PSSM → structure.
#[derive(Debug, Clone)]
pub struct LocalPredictor {
    psiblast: PsiBlast,
    model: ModelCommand,
}

impl LocalPredictor {
    pub fn new(psiblast: PsiBlast, model: ModelCommand) -> Self {
        Self { psiblast, model }
    }
}

#[async_trait]
impl Predictor for LocalPredictor {
    fn name(&self) -> &str {
        "local"
    }

    async fn predict(&self, sequence: &str) -> Result<RawStructure, PredictorError> {
        let scratch = tempfile::tempdir()?;
        let fasta = scratch.path().join("query.fasta");
        let pssm_path = scratch.path().join("query.pssm");
        let report = scratch.path().join("blast_output.txt");

        tokio::fs::write(&fasta, format!(">query\n{sequence}\n")).await?;
        self.psiblast.run(&fasta, &pssm_path, &report).await?;

        let pssm_text = tokio::fs::read_to_string(&pssm_path).await?;
        let pssm = parse_ascii_pssm(&pssm_text)?;
        tracing::debug!(rows = pssm.len(), "Parsed PSSM");

        self.model.run(sequence, &pssm).await
    }
}
