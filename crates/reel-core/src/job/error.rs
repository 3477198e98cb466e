use std::time::Duration;

use thiserror::Error;

use crate::retry::{classify, TransportError};

use super::JobId;

/// Errors surfaced by the job controller.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job is already queued or processing; the submission was ignored.
    #[error("a job is already in progress{}", fmt_job(.job_id))]
    Busy { job_id: Option<JobId> },
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
    /// The creation call itself failed. Creation is not idempotent, so it is
    /// never retried automatically.
    #[error("job creation failed: {0}")]
    CreateFailed(#[source] TransportError),
    /// Terminal transport error on a status check (e.g. expired
    /// authorization, unknown job).
    #[error("status check rejected: {0}")]
    Rejected(#[source] TransportError),
    /// Transient transport errors beyond the retry cap.
    #[error("status checks failed {attempts} times in a row: {error}")]
    PollExhausted {
        attempts: u32,
        #[source]
        error: TransportError,
    },
    #[error("no terminal status after {}s of polling", .0.as_secs())]
    PollTimeout(Duration),
    /// The renderer reported the job as failed.
    #[error("render failed: {0}")]
    JobFailed(String),
    #[error("job cancelled")]
    Cancelled,
}

fn fmt_job(job_id: &Option<JobId>) -> String {
    match job_id {
        Some(id) => format!(" ({id})"),
        None => String::new(),
    }
}

impl JobError {
    /// True when offering the user a retry makes sense.
    pub fn is_recoverable(&self) -> bool {
        match self {
            JobError::CreateFailed(e) => classify(e).is_transient(),
            JobError::PollExhausted { .. } | JobError::PollTimeout(_) | JobError::JobFailed(_) => {
                true
            }
            JobError::Busy { .. }
            | JobError::InvalidState { .. }
            | JobError::Rejected(_)
            | JobError::Cancelled => false,
        }
    }
}
