//! Production jobs: the record, the lifecycle controller, and the async
//! driver that runs the controller against a renderer.

mod controller;
mod driver;
mod error;
mod types;

pub use controller::{JobController, StatusRequest, Submission};
pub use driver::JobDriver;
pub use error::JobError;
pub use types::{JobId, JobStatus, ProductionJob};

use std::time::Duration;

/// Something the owner of a job should know about.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The renderer accepted the job; it is Queued and being polled.
    Submitted { job_id: JobId },
    /// Status or progress moved forward.
    Progress {
        job_id: JobId,
        status: JobStatus,
        progress: u8,
    },
    /// A status check failed transiently and will be retried.
    Retrying { attempt: u32, delay: Duration },
    /// Terminal success. Emitted once per job.
    Completed(ProductionJob),
    /// Terminal failure. Emitted once per job; only `retry` moves on.
    Failed { job_id: JobId, error: String },
}
