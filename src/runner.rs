//! Drives each job from `Queued` to a terminal state on its own task.
//!
//! The runner owns the only code path that writes a job's status after
//! creation. Whatever happens inside the predictor or the artifact writer
//! (an error, a hang past the job timeout, a panic) ends as exactly one
//! `Completed` or `Failed` transition.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::artifact::{ArtifactContext, ArtifactWriter, WriteError};
use crate::jobs::{ArtifactRef, JobStore, PredictionKind, Transition};
use crate::predictor::{Predictor, PredictorError};

/// Why a job ended up `Failed`. The `Display` text is stored on the job.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error("prediction failed: {0}")]
    Predictor(#[from] PredictorError),

    #[error("{0}")]
    Write(#[from] WriteError),

    #[error("predictor returned {returned} output for a {expected} job")]
    KindMismatch {
        expected: PredictionKind,
        returned: PredictionKind,
    },

    #[error("prediction timed out after {0:?}")]
    TimedOut(Duration),

    #[error("prediction task panicked: {0}")]
    Panicked(String),

    #[error("prediction task was cancelled")]
    Cancelled,
}

/// Everything a job needs to run, cloned into its task.
struct Assignment {
    job_id: Uuid,
    kind: PredictionKind,
    sequence: String,
    predictor: Arc<dyn Predictor>,
}

/// Decrements the in-flight count when a job task ends, however it ends.
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Spawns and tracks one task per dispatched job.
pub struct JobRunner {
    store: Arc<JobStore>,
    writer: Arc<dyn ArtifactWriter>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    in_flight: Arc<watch::Sender<usize>>,
    timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(
        store: Arc<JobStore>,
        writer: Arc<dyn ArtifactWriter>,
        max_concurrent_jobs: usize,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            writer,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            tracker: TaskTracker::new(),
            in_flight: Arc::new(watch::channel(0).0),
            timeout,
        }
    }

    /// Start driving a job in the background and return immediately.
    pub fn dispatch(
        &self,
        job_id: Uuid,
        kind: PredictionKind,
        sequence: String,
        predictor: Arc<dyn Predictor>,
    ) {
        let assignment = Assignment {
            job_id,
            kind,
            sequence,
            predictor,
        };
        let store = Arc::clone(&self.store);
        let writer = Arc::clone(&self.writer);
        let permits = Arc::clone(&self.permits);
        let timeout = self.timeout;

        self.in_flight.send_modify(|n| *n += 1);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        self.tracker.spawn(async move {
            let _guard = guard;
            drive(store, writer, permits, timeout, assignment).await;
        });
    }

    /// Number of jobs dispatched but not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until no dispatched job is left unfinished. Any number of
    /// callers may wait at once, and the runner keeps accepting jobs.
    pub async fn wait_idle(&self) {
        let mut idle = self.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = idle.wait_for(|n| *n == 0).await;
    }

    /// Stop for good: wait up to `grace` for dispatched jobs, then fail every
    /// job still waiting for a permit. Running predictions are left to finish
    /// or time out. Returns `false` if the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return true;
        }
        self.permits.close();
        false
    }
}

async fn drive(
    store: Arc<JobStore>,
    writer: Arc<dyn ArtifactWriter>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
    assignment: Assignment,
) {
    let job_id = assignment.job_id;

    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        // Closed by `shutdown` once the grace period has run out.
        Err(_) => {
            finish(&store, job_id, Transition::Fail("job runner is shut down".into())).await;
            return;
        }
    };

    if let Err(e) = store.update(&job_id, Transition::Start).await {
        tracing::error!(job_id = %job_id, error = %e, "Could not start job");
        return;
    }
    tracing::debug!(
        job_id = %job_id,
        predictor = assignment.predictor.name(),
        "Job processing"
    );

    let transition = match execute(writer, timeout, assignment).await {
        Ok(artifact) => Transition::Complete(artifact),
        Err(failure) => {
            if matches!(failure, RunFailure::Panicked(_)) {
                tracing::error!(job_id = %job_id, error = %failure, "Job task panicked");
            }
            Transition::Fail(failure.to_string())
        }
    };
    finish(&store, job_id, transition).await;
}

/// Run predictor and writer on a nested task so a panic or timeout there
/// cannot skip the terminal transition.
async fn execute(
    writer: Arc<dyn ArtifactWriter>,
    timeout: Option<Duration>,
    assignment: Assignment,
) -> Result<ArtifactRef, RunFailure> {
    let Assignment {
        job_id,
        kind,
        sequence,
        predictor,
    } = assignment;

    let mut handle = tokio::spawn(async move {
        let raw = predictor.predict(&sequence).await?;
        if raw.kind() != kind {
            return Err(RunFailure::KindMismatch {
                expected: kind,
                returned: raw.kind(),
            });
        }
        let ctx = ArtifactContext {
            job_id,
            sequence: &sequence,
        };
        Ok(writer.write(ctx, raw).await?)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Err(RunFailure::TimedOut(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(RunFailure::Panicked(panic_message(e.into_panic()))),
        Err(_) => Err(RunFailure::Cancelled),
    }
}

async fn finish(store: &JobStore, job_id: Uuid, transition: Transition) {
    match store.update(&job_id, transition).await {
        Ok(job) => match (&job.result, &job.error) {
            (Some(artifact), _) => tracing::info!(
                job_id = %job_id,
                path = %artifact.path.display(),
                duration_ms = job.duration_ms(),
                "Job completed"
            ),
            (_, error) => tracing::warn!(
                job_id = %job_id,
                error = error.as_deref().unwrap_or_default(),
                duration_ms = job.duration_ms(),
                "Job failed"
            ),
        },
        Err(e) => tracing::error!(job_id = %job_id, error = %e, "Could not record job outcome"),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::artifact::FileArtifactWriter;
    use crate::config::ContactsConfig;
    use crate::jobs::JobStatus;
    use crate::predictor::RawStructure;

    const PDB: &str = "ATOM      1  N   MET A   1      11.104   6.134  -6.504  1.00  0.00           N\n";

    enum Behaviour {
        Pdb,
        Distances,
        Fail,
        Panic,
        Hang,
    }

    struct StubPredictor(Behaviour);

    #[async_trait]
    impl Predictor for StubPredictor {
        fn name(&self) -> &str {
            "stub"
        }

        async fn predict(&self, _sequence: &str) -> Result<RawStructure, PredictorError> {
            match self.0 {
                Behaviour::Pdb => Ok(RawStructure::Pdb(PDB.into())),
                Behaviour::Distances => Ok(RawStructure::DistanceMap(vec![vec![0.0]])),
                Behaviour::Fail => Err(PredictorError::MalformedOutput("bad model".into())),
                Behaviour::Panic => panic!("model weights missing"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }
    }

    struct Harness {
        store: Arc<JobStore>,
        runner: JobRunner,
        _dir: tempfile::TempDir,
    }

    fn harness(timeout: Option<Duration>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::new());
        let writer = Arc::new(FileArtifactWriter::new(dir.path(), ContactsConfig::default()));
        let runner = JobRunner::new(Arc::clone(&store), writer, 2, timeout);
        Harness {
            store,
            runner,
            _dir: dir,
        }
    }

    async fn run(h: &Harness, kind: PredictionKind, behaviour: Behaviour) -> crate::jobs::Job {
        let id = h.store.create("M".into(), kind).await;
        h.runner
            .dispatch(id, kind, "M".into(), Arc::new(StubPredictor(behaviour)));
        h.runner.wait_idle().await;
        h.store.get(&id).await.unwrap()
    }

    #[tokio::test]
    async fn successful_pipeline_completes_job() {
        let h = harness(None);
        let job = run(&h, PredictionKind::Structure, Behaviour::Pdb).await;

        assert_eq!(job.status, JobStatus::Completed);
        let artifact = job.result.unwrap();
        assert_eq!(std::fs::read_to_string(artifact.path).unwrap(), PDB);
        assert!(job.error.is_none());
        assert_eq!(h.runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn predictor_error_fails_job() {
        let h = harness(None);
        let job = run(&h, PredictionKind::Structure, Behaviour::Fail).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("prediction failed: malformed predictor output: bad model")
        );
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn panic_in_predictor_is_contained() {
        let h = harness(None);
        let job = run(&h, PredictionKind::Structure, Behaviour::Panic).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("prediction task panicked: model weights missing")
        );
    }

    #[tokio::test]
    async fn hung_predictor_times_out() {
        let h = harness(Some(Duration::from_millis(50)));
        let job = run(&h, PredictionKind::Structure, Behaviour::Hang).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("prediction timed out after 50ms"));
    }

    #[tokio::test]
    async fn output_of_the_wrong_kind_fails_job() {
        let h = harness(None);
        let job = run(&h, PredictionKind::Structure, Behaviour::Distances).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("predictor returned contacts output for a structure job")
        );
    }

    #[tokio::test]
    async fn write_failure_fails_job() {
        let h = harness(None);
        let id = h.store.create("M".into(), PredictionKind::Structure).await;
        struct HeaderOnly;
        #[async_trait]
        impl Predictor for HeaderOnly {
            fn name(&self) -> &str {
                "header-only"
            }
            async fn predict(&self, _: &str) -> Result<RawStructure, PredictorError> {
                Ok(RawStructure::Pdb("HEADER\n".into()))
            }
        }

        h.runner
            .dispatch(id, PredictionKind::Structure, "M".into(), Arc::new(HeaderOnly));
        h.runner.wait_idle().await;

        let job = h.store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().starts_with("cannot encode prediction"));
    }

    #[tokio::test]
    async fn jobs_beyond_the_permit_limit_stay_queued() {
        let h = harness(None);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = h.store.create("M".into(), PredictionKind::Structure).await;
            h.runner.dispatch(
                id,
                PredictionKind::Structure,
                "M".into(),
                Arc::new(StubPredictor(Behaviour::Hang)),
            );
            ids.push(id);
        }

        // Give the runner tasks a chance to pick up permits.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut processing = 0;
        let mut queued = 0;
        for id in &ids {
            match h.store.get(id).await.unwrap().status {
                JobStatus::Processing => processing += 1,
                JobStatus::Queued => queued += 1,
                other => panic!("unexpected status {other}"),
            }
        }
        assert_eq!(processing, 2);
        assert_eq!(queued, 1);
        assert_eq!(h.runner.in_flight(), 3);
    }

    #[tokio::test]
    async fn concurrent_waiters_all_see_idle() {
        let h = harness(None);
        let id = h.store.create("M".into(), PredictionKind::Structure).await;
        h.runner.dispatch(
            id,
            PredictionKind::Structure,
            "M".into(),
            Arc::new(StubPredictor(Behaviour::Pdb)),
        );

        tokio::join!(h.runner.wait_idle(), h.runner.wait_idle());
        assert_eq!(h.runner.in_flight(), 0);

        // Still accepts work after draining.
        let job = run(&h, PredictionKind::Structure, Behaviour::Pdb).await;
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn shutdown_fails_jobs_still_waiting_for_a_permit() {
        let h = harness(None);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = h.store.create("M".into(), PredictionKind::Structure).await;
            h.runner.dispatch(
                id,
                PredictionKind::Structure,
                "M".into(),
                Arc::new(StubPredictor(Behaviour::Hang)),
            );
            ids.push(id);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!h.runner.shutdown(Duration::from_millis(20)).await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut failed = Vec::new();
        for id in &ids {
            let job = h.store.get(id).await.unwrap();
            match job.status {
                JobStatus::Processing => {}
                JobStatus::Failed => failed.push(job.error.unwrap()),
                other => panic!("unexpected status {other}"),
            }
        }
        assert_eq!(failed, vec!["job runner is shut down".to_string()]);
        assert_eq!(h.runner.in_flight(), 2);
    }

    #[tokio::test]
    async fn shutdown_with_no_jobs_is_immediate() {
        let h = harness(None);
        assert!(h.runner.shutdown(Duration::from_millis(10)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_local_job_kills_psiblast() {
        use crate::predictor::{LocalPredictor, ModelCommand, PsiBlast};

        let h = harness(Some(Duration::from_millis(100)));
        let marker = h._dir.path().join("psiblast-finished");
        let psiblast = PsiBlast {
            program: "sh".into(),
            program_args: vec![
                "-c".into(),
                format!("sleep 1; touch '{}'", marker.display()),
            ],
            db: "swissprot".into(),
            num_iterations: 1,
        };
        let model = ModelCommand {
            program: "true".into(),
            args: Vec::new(),
        };

        let id = h.store.create("MKT".into(), PredictionKind::Structure).await;
        h.runner.dispatch(
            id,
            PredictionKind::Structure,
            "MKT".into(),
            Arc::new(LocalPredictor::new(psiblast, model)),
        );
        h.runner.wait_idle().await;

        let job = h.store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("prediction timed out after 100ms"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "psiblast outlived its job");
    }

    #[test]
    fn panic_message_handles_both_payload_types() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic payload");
    }
}
