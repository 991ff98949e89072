mod job;
mod store;

pub use job::{
    ArtifactFormat, ArtifactRef, Job, JobStatus, JobSummary, PredictionKind, Transition,
};
pub use store::JobStore;
