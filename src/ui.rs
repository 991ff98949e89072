//! Terminal output for the client subcommands: a spinner while waiting on a
//! job and colored status lines.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use crate::jobs::{JobStatus, JobSummary};

/// Spinner shown while `submit --wait` polls a job.
pub struct JobProgress {
    // Spinner drawn on stderr.
    pb: ProgressBar,
    // Completed jobs.
    green: Style,
    // Failed jobs.
    red: Style,
}

impl JobProgress {
    pub fn start(job_id: &Uuid) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("{job_id}: {}", JobStatus::Queued));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    pub fn update(&self, job_id: &Uuid, status: JobStatus) {
        self.pb.set_message(format!("{job_id}: {status}"));
    }

    /// Clear the spinner and print the terminal outcome.
    pub fn finish(&self, job_id: &Uuid, status: JobStatus, error: Option<&str>) {
        self.pb.finish_and_clear();
        match status {
            JobStatus::Completed => {
                println!("  {} Job {job_id} completed", self.green.apply_to("✓"));
            }
            _ => {
                let reason = error.unwrap_or("unknown error");
                println!("  {} Job {job_id} failed: {reason}", self.red.apply_to("✗"));
            }
        }
    }
}

/// Color for a status: green when done, red when failed, cyan while running,
/// yellow while waiting.
pub fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Completed => Style::new().green(),
        JobStatus::Failed => Style::new().red(),
        JobStatus::Processing => Style::new().cyan(),
        JobStatus::Queued => Style::new().yellow(),
    }
}

/// One status line, plus the failure reason underneath when there is one.
pub fn print_status(job_id: &Uuid, status: JobStatus, error: Option<&str>) {
    println!("{job_id}  {}", status_style(status).apply_to(status));
    if let Some(error) = error {
        println!("  {}", Style::new().dim().apply_to(error));
    }
}

pub fn print_history(jobs: &[JobSummary]) {
    if jobs.is_empty() {
        println!("{}", Style::new().dim().apply_to("No jobs submitted yet"));
        return;
    }
    let header = Style::new().bold();
    println!(
        "{:<36}  {:<10}  {}",
        header.apply_to("JOB"),
        header.apply_to("STATUS"),
        header.apply_to("CREATED")
    );
    for job in jobs {
        let status = format!("{:<10}", job.status.to_string());
        println!(
            "{:<36}  {}  {}",
            job.job_id,
            status_style(job.status).apply_to(status),
            job.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}
