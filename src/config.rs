//! Service configuration loaded from `foldjob.toml`.
//!
//! [`FoldConfig`] holds every tunable parameter. Values absent from the file
//! fall back to defaults, and a handful of environment variables take
//! precedence over the file so containers can be configured without one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::predictor::esm_atlas;

pub const DEFAULT_CONFIG_FILE: &str = "foldjob.toml";

/// Which predictor serves structure jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    /// Remote ESM Metagenomic Atlas folding API.
    EsmAtlas,
    /// Local PSI-BLAST + model pipeline.
    Local,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FoldConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory artifacts are written to, one file per job.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Allowed CORS origins; `"*"` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on predictions running at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Wall-clock limit for one job's pipeline; 0 disables it.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    #[serde(default = "default_predictor")]
    pub predictor: PredictorKind,

    #[serde(default)]
    pub esm_atlas: EsmAtlasConfig,

    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default)]
    pub contacts: ContactsConfig,
}

/// Settings for the remote folding API.
#[derive(Debug, Clone, Deserialize)]
pub struct EsmAtlasConfig {
    #[serde(default = "default_esm_url")]
    pub url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_esm_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the local PSI-BLAST + model pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_psiblast")]
    pub psiblast: String,

    #[serde(default)]
    pub psiblast_args: Vec<String>,

    /// Path to the BLAST database, e.g. a local SwissProt copy.
    #[serde(default = "default_blast_db")]
    pub blast_db: String,

    #[serde(default = "default_num_iterations")]
    pub num_iterations: u32,

    /// Model executable; contact-map jobs are disabled while unset.
    #[serde(default)]
    pub model_command: Option<String>,

    #[serde(default)]
    pub model_args: Vec<String>,
}

/// Contact extraction from distance maps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContactsConfig {
    /// Pairs closer than this (Å) count as contacts.
    #[serde(default = "default_contact_threshold")]
    pub threshold: f32,

    /// Minimum sequence separation `j - i` for a reported pair.
    #[serde(default = "default_min_separation")]
    pub min_separation: usize,
}

// Loopback only unless overridden.
fn default_host() -> String {
    "127.0.0.1".to_string()
}

// Default port: 5000.
fn default_port() -> u16 {
    5000
}

// Relative to the working directory.
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

// Any origin.
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Per HTTP request, not per job.
fn default_request_timeout_secs() -> u64 {
    30
}

// Default concurrency: 4 predictions.
fn default_max_concurrent_jobs() -> usize {
    4
}

// Ten minutes per job.
fn default_job_timeout_secs() -> u64 {
    600
}

// Remote API; needs no local tools.
fn default_predictor() -> PredictorKind {
    PredictorKind::EsmAtlas
}

// Public ESM Atlas fold endpoint.
fn default_esm_url() -> String {
    esm_atlas::DEFAULT_URL.to_string()
}

// Default connect timeout: 10 seconds.
fn default_connect_timeout_secs() -> u64 {
    10
}

// Folding long sequences can take minutes.
fn default_esm_timeout_secs() -> u64 {
    300
}

// Resolved through PATH.
fn default_psiblast() -> String {
    "psiblast".to_string()
}

// Database name as passed to -db.
fn default_blast_db() -> String {
    "swissprot".to_string()
}

// Default PSI-BLAST iterations: 3.
fn default_num_iterations() -> u32 {
    3
}

// Contact cutoff in Ångström.
fn default_contact_threshold() -> f32 {
    8.0
}

// Skip near-diagonal pairs.
fn default_min_separation() -> usize {
    6
}

impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            artifact_dir: default_artifact_dir(),
            cors_origins: default_cors_origins(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout_secs: default_job_timeout_secs(),
            predictor: default_predictor(),
            esm_atlas: EsmAtlasConfig::default(),
            local: LocalConfig::default(),
            contacts: ContactsConfig::default(),
        }
    }
}

impl Default for EsmAtlasConfig {
    fn default() -> Self {
        Self {
            url: default_esm_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_esm_timeout_secs(),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            psiblast: default_psiblast(),
            psiblast_args: Vec::new(),
            blast_db: default_blast_db(),
            num_iterations: default_num_iterations(),
            model_command: None,
            model_args: Vec::new(),
        }
    }
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            threshold: default_contact_threshold(),
            min_separation: default_min_separation(),
        }
    }
}

impl FoldConfig {
    /// Load configuration from `path`, or from `foldjob.toml` in the working
    /// directory when no path is given. A missing default file yields the
    /// defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Environment variables take precedence over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        let set = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = set("FOLDJOB_HOST") {
            self.host = host;
        }
        if let Some(port) = set("FOLDJOB_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("FOLDJOB_PORT must be a valid port, got {port:?}"))?;
        }
        if let Some(dir) = set("FOLDJOB_ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(dir);
        }
        if let Some(url) = set("ESM_ATLAS_URL") {
            self.esm_atlas.url = url;
        }
        Ok(())
    }

    /// `None` when the job timeout is disabled.
    pub fn job_timeout(&self) -> Option<std::time::Duration> {
        (self.job_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.job_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_values() {
        let config = FoldConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.artifact_dir, PathBuf::from("artifacts"));
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.predictor, PredictorKind::EsmAtlas);
        assert_eq!(config.esm_atlas.url, esm_atlas::DEFAULT_URL);
        assert_eq!(config.contacts.threshold, 8.0);
        assert_eq!(config.contacts.min_separation, 6);
        assert!(config.local.model_command.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            port = 8080
            predictor = "local"

            [local]
            blast_db = "/data/blast/swissprot"
            model_command = "python3"
            model_args = ["predict.py"]

            [contacts]
            threshold = 6.5
        "#;
        let config: FoldConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.predictor, PredictorKind::Local);
        assert_eq!(config.local.blast_db, "/data/blast/swissprot");
        assert_eq!(config.local.model_command.as_deref(), Some("python3"));
        assert_eq!(config.local.model_args, vec!["predict.py"]);
        assert_eq!(config.local.num_iterations, 3);
        assert_eq!(config.contacts.threshold, 6.5);
        assert_eq!(config.contacts.min_separation, 6);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("FOLDJOB_PORT", "9000"),
            ("FOLDJOB_ARTIFACT_DIR", "/var/lib/foldjob"),
            ("ESM_ATLAS_URL", "http://localhost:1234/fold"),
            ("FOLDJOB_HOST", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = FoldConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.artifact_dir, PathBuf::from("/var/lib/foldjob"));
        assert_eq!(config.esm_atlas.url, "http://localhost:1234/fold");
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn invalid_port_in_env_is_an_error() {
        let mut config = FoldConfig::default();
        let err = config
            .apply_env(|key| (key == "FOLDJOB_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("FOLDJOB_PORT"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent_jobs = 16\njob_timeout_secs = 0").unwrap();

        let config = FoldConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_concurrent_jobs, 16);
        assert!(config.job_timeout().is_none());
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let err = FoldConfig::load(Some(Path::new("/nonexistent/foldjob.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
