//! Command-line interface built on clap.
//!
//! `serve` runs the HTTP service; the other subcommands are thin clients of a
//! running server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::client::DEFAULT_ADDR;

/// Asynchronous protein structure prediction service.
#[derive(Debug, Parser)]
#[command(name = "foldjob", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (default: ./foldjob.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Bind address, overriding the config file.
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Submit a sequence to a running server.
    Submit {
        /// Amino-acid sequence in one-letter codes.
        sequence: String,

        /// Predict a residue contact map instead of a structure.
        #[arg(long)]
        contacts: bool,

        /// Wait for the job to finish and print its result.
        #[arg(long)]
        wait: bool,

        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },

    /// Show a job's status.
    Status {
        job_id: Uuid,

        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },

    /// Fetch a completed job's artifact.
    Result {
        job_id: Uuid,

        /// Write the artifact to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },

    /// List every job the server knows about.
    History {
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },
}
