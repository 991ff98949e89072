use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::job::{Job, JobSummary, PredictionKind, Transition};
use crate::error::JobError;

/// In-memory registry of jobs keyed by id.
///
/// The outer map lock is only held exclusively while inserting. Reads and
/// updates hold it shared long enough to clone the entry handle, then lock
/// that single entry, so work on one job never waits on another.
#[derive(Debug, Default)]
pub struct JobStore {
    registry: RwLock<Registry>,
}

#[derive(Debug, Default)]
struct Registry {
    jobs: HashMap<Uuid, Slot>,
    next_seq: u64,
}

/// A job plus its insertion number, which orders history when timestamps tie.
#[derive(Debug)]
struct Slot {
    seq: u64,
    job: Arc<Mutex<Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `Queued` job and return its freshly drawn id.
    pub async fn create(&self, sequence: String, kind: PredictionKind) -> Uuid {
        let mut registry = self.registry.write().await;
        let id = loop {
            let candidate = Uuid::new_v4();
            if !registry.jobs.contains_key(&candidate) {
                break candidate;
            }
        };
        let seq = registry.next_seq;
        registry.next_seq += 1;
        registry.jobs.insert(
            id,
            Slot {
                seq,
                job: Arc::new(Mutex::new(Job::new(id, kind, sequence))),
            },
        );
        id
    }

    /// Snapshot of a job record.
    pub async fn get(&self, id: &Uuid) -> Option<Job> {
        let entry = self.entry(id).await?;
        let job = entry.lock().await;
        Some(job.clone())
    }

    /// Apply a transition to an existing job, returning the updated snapshot.
    pub async fn update(&self, id: &Uuid, transition: Transition) -> Result<Job, JobError> {
        let entry = self.entry(id).await.ok_or(JobError::NotFound(*id))?;
        let mut job = entry.lock().await;
        job.apply(transition)?;
        Ok(job.clone())
    }

    /// Every job's id and status in submission order.
    pub async fn list_all(&self) -> Vec<JobSummary> {
        let mut entries: Vec<(u64, Arc<Mutex<Job>>)> = self
            .registry
            .read()
            .await
            .jobs
            .values()
            .map(|slot| (slot.seq, Arc::clone(&slot.job)))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);

        let mut summaries = Vec::with_capacity(entries.len());
        for (_, entry) in entries {
            summaries.push(entry.lock().await.summary());
        }
        summaries
    }

    pub async fn len(&self) -> usize {
        self.registry.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.read().await.jobs.is_empty()
    }

    async fn entry(&self, id: &Uuid) -> Option<Arc<Mutex<Job>>> {
        self.registry
            .read()
            .await
            .jobs
            .get(id)
            .map(|slot| Arc::clone(&slot.job))
    }
}
