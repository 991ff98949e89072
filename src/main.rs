use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use foldjob::cli::{Cli, Command};
use foldjob::client::FoldClient;
use foldjob::config::FoldConfig;
use foldjob::jobs::{JobStatus, PredictionKind};
use foldjob::service::JobService;
use foldjob::{http, ui};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "foldjob=debug,tower_http=debug"
    } else {
        "foldjob=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Serve { host, port } => {
            let mut config = FoldConfig::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let service = Arc::new(JobService::from_config(&config)?);
            http::serve(service, &config).await
        }
        Command::Submit {
            sequence,
            contacts,
            wait,
            addr,
        } => {
            let kind = if contacts {
                PredictionKind::Contacts
            } else {
                PredictionKind::Structure
            };
            let client = FoldClient::new(addr)?;
            let job_id = client.submit(kind, &sequence).await?;
            if !wait {
                println!("{job_id}");
                return Ok(());
            }
            wait_and_print(&client, &job_id).await
        }
        Command::Status { job_id, addr } => {
            let status = FoldClient::new(addr)?.status(&job_id).await?;
            ui::print_status(&status.job_id, status.status, status.error.as_deref());
            Ok(())
        }
        Command::Result {
            job_id,
            output,
            addr,
        } => {
            let artifact = FoldClient::new(addr)?.result(&job_id).await?;
            write_artifact(artifact.contents(), output).await
        }
        Command::History { addr } => {
            let jobs = FoldClient::new(addr)?.history().await?;
            ui::print_history(&jobs);
            Ok(())
        }
    }
}

async fn wait_and_print(client: &FoldClient, job_id: &Uuid) -> Result<()> {
    let progress = ui::JobProgress::start(job_id);
    let status = loop {
        let status = client.status(job_id).await?;
        if status.status.is_terminal() {
            break status;
        }
        progress.update(job_id, status.status);
        tokio::time::sleep(POLL_INTERVAL).await;
    };
    progress.finish(job_id, status.status, status.error.as_deref());

    if status.status != JobStatus::Completed {
        bail!("job {job_id} did not complete");
    }
    let artifact = client.result(job_id).await?;
    print!("{}", artifact.contents());
    Ok(())
}

async fn write_artifact(contents: &str, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{contents}");
            Ok(())
        }
    }
}
