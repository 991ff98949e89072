//! PSI-BLAST invocation and ASCII PSSM parsing.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use super::error::PredictorError;

/// Number of amino-acid score columns in an ASCII PSSM row.
pub const PSSM_COLUMNS: usize = 20;

/// One PSSM row: log-odds scores for the 20 standard residues.
pub type PssmRow = [f32; PSSM_COLUMNS];

/// Runs `psiblast` against a local database to build a PSSM.
#[derive(Debug, Clone)]
pub struct PsiBlast {
    pub program: String,
    /// Arguments placed before the generated ones (e.g. a wrapper script).
    pub program_args: Vec<String>,
    pub db: String,
    pub num_iterations: u32,
}

impl PsiBlast {
    /// Search `fasta` and write the last iteration's ASCII PSSM to `pssm`.
    pub async fn run(&self, fasta: &Path, pssm: &Path, report: &Path) -> Result<(), PredictorError> {
        tracing::debug!(program = %self.program, db = %self.db, "Running psiblast");

        let output = Command::new(&self.program)
            .args(&self.program_args)
            .arg("-query")
            .arg(fasta)
            .arg("-db")
            .arg(&self.db)
            .arg("-num_iterations")
            .arg(self.num_iterations.to_string())
            .arg("-out_ascii_pssm")
            .arg(pssm)
            .arg("-out")
            .arg(report)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PredictorError::Spawn {
                tool: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PredictorError::ToolFailed {
                tool: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Parse the score matrix out of a `-out_ascii_pssm` file.
///
/// Data rows start at the first line beginning with `1` and look like
/// `<pos> <residue> <20 scores> <20 percentages> ...`. Reading stops at the
/// first row with fewer than 22 fields, which is the blank line before the
/// trailing lambda statistics.
pub fn parse_ascii_pssm(text: &str) -> Result<Vec<PssmRow>, PredictorError> {
    let mut rows = Vec::new();

    let data = text
        .lines()
        .skip_while(|line| !line.trim_start().starts_with('1'));

    for line in data {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < PSSM_COLUMNS + 2 {
            break;
        }

        let mut row = [0.0f32; PSSM_COLUMNS];
        for (slot, token) in row.iter_mut().zip(&tokens[2..PSSM_COLUMNS + 2]) {
            let score: i32 = token.parse().map_err(|_| {
                PredictorError::MalformedOutput(format!(
                    "PSSM row {} has non-integer score {token:?}",
                    tokens[0]
                ))
            })?;
            *slot = score as f32;
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(PredictorError::MalformedOutput(
            "PSSM contains no score rows".into(),
        ));
    }
    Ok(rows)
}
