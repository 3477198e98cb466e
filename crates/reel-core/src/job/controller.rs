//! Job lifecycle state machine: submit → track → resolve.
//!
//! Like the scheduler underneath it, the controller performs no I/O. Each
//! step hands the caller a token ([`Submission`], [`StatusRequest`]) naming
//! the remote call to make; the caller makes it and feeds the result back.
//! Tokens from a cancelled, retried or superseded run are recognised and
//! their results dropped.

use std::time::{Duration, Instant};

use crate::renderer::{CreatedJob, StatusReport};
use crate::retry::TransportError;
use crate::scheduler::{
    PollEpoch, PollHandle, PollOutcome, PollSettings, PollTicket, PollingScheduler, Tick,
};
use crate::script::ProductionRequest;

use super::types::Transition;
use super::{JobError, JobEvent, JobId, JobStatus, ProductionJob};

/// A creation call the caller must perform.
#[derive(Debug)]
pub struct Submission {
    id: u64,
    request: ProductionRequest,
}

impl Submission {
    pub fn request(&self) -> &ProductionRequest {
        &self.request
    }
}

/// A status check the caller must perform.
#[derive(Debug)]
pub struct StatusRequest {
    ticket: PollTicket,
    job_id: JobId,
}

impl StatusRequest {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn epoch(&self) -> PollEpoch {
        self.ticket.epoch()
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    /// Creation call outstanding.
    Submitting { id: u64 },
    /// A job exists. `poll` is None once it is terminal, or while it is
    /// stalled after transport errors / timeout.
    Tracking {
        job: ProductionJob,
        poll: Option<PollHandle>,
    },
}

#[derive(Debug)]
pub struct JobController {
    scheduler: PollingScheduler,
    phase: Phase,
    /// Request of the current (or last failed) submission, kept for `retry`.
    request: Option<ProductionRequest>,
    submissions: u64,
}

impl JobController {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            scheduler: PollingScheduler::new(settings),
            phase: Phase::Idle,
            request: None,
            submissions: 0,
        }
    }

    /// Snapshot of the current job, if one exists.
    pub fn job(&self) -> Option<&ProductionJob> {
        match &self.phase {
            Phase::Tracking { job, .. } => Some(job),
            _ => None,
        }
    }

    /// A submission is outstanding or the job is queued/processing.
    pub fn is_busy(&self) -> bool {
        match &self.phase {
            Phase::Idle => false,
            Phase::Submitting { .. } => true,
            Phase::Tracking { job, .. } => job.status.is_active(),
        }
    }

    /// The job is still active remotely but nothing is polling it.
    pub fn is_stalled(&self) -> bool {
        matches!(&self.phase, Phase::Tracking { job, poll: None } if job.status.is_active())
    }

    fn state_name(&self) -> &'static str {
        match &self.phase {
            Phase::Idle => "idle",
            Phase::Submitting { .. } => "submitting",
            Phase::Tracking { job, poll } => match (job.status, poll) {
                (JobStatus::Completed, _) => "completed",
                (JobStatus::Failed, _) => "failed",
                (_, None) => "stalled",
                (_, Some(_)) => "tracking",
            },
        }
    }

    /// Begin a new job. Rejected with [`JobError::Busy`] while another job is
    /// being created, queued or processed; a finished job is discarded.
    pub fn submit(&mut self, request: ProductionRequest) -> Result<Submission, JobError> {
        if self.is_busy() {
            let job_id = self.job().map(|j| j.id.clone());
            tracing::info!(?job_id, "submission rejected: job in progress");
            return Err(JobError::Busy { job_id });
        }
        self.stop_polling();
        self.submissions += 1;
        let id = self.submissions;
        self.phase = Phase::Submitting { id };
        self.request = Some(request.clone());
        tracing::info!(submission = id, title = %request.script.title, "submitting job");
        Ok(Submission { id, request })
    }

    /// Feed back the result of a creation call. On success the job is
    /// Queued and polling starts immediately.
    pub fn on_created(
        &mut self,
        submission: Submission,
        result: Result<CreatedJob, TransportError>,
        now: Instant,
    ) -> Result<Option<JobEvent>, JobError> {
        match self.phase {
            Phase::Submitting { id } if id == submission.id => {}
            _ => {
                if let Ok(created) = &result {
                    tracing::warn!(job = %created.job_id, "job created after its submission was abandoned");
                }
                return Ok(None);
            }
        }
        match result {
            Ok(created) => {
                let poll = self.scheduler.start(now);
                tracing::info!(job = %created.job_id, epoch = %poll.epoch(), "job queued");
                let job_id = created.job_id.clone();
                self.phase = Phase::Tracking {
                    job: ProductionJob::queued(created.job_id),
                    poll: Some(poll),
                };
                Ok(Some(JobEvent::Submitted { job_id }))
            }
            Err(e) => {
                tracing::warn!("job creation failed: {}", e);
                self.phase = Phase::Idle;
                Err(JobError::CreateFailed(e))
            }
        }
    }

    /// Ask whether a status check should be made now.
    ///
    /// Returns [`JobError::PollTimeout`] (and stalls the job) once the
    /// polling run exceeds its maximum duration.
    pub fn poll_due(&mut self, now: Instant) -> Result<Option<StatusRequest>, JobError> {
        let Phase::Tracking { job, poll } = &mut self.phase else {
            return Ok(None);
        };
        if poll.is_none() {
            return Ok(None);
        }
        match self.scheduler.tick(now) {
            Tick::Due(ticket) => Ok(Some(StatusRequest {
                ticket,
                job_id: job.id.clone(),
            })),
            Tick::Wait(_) | Tick::InFlight => Ok(None),
            Tick::Idle => {
                *poll = None;
                Ok(None)
            }
            Tick::TimedOut { elapsed } => {
                *poll = None;
                Err(JobError::PollTimeout(elapsed))
            }
        }
    }

    /// How long until the next status check, while one is scheduled.
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        match &self.phase {
            Phase::Tracking { poll: Some(_), .. } => self.scheduler.next_due_in(now),
            _ => None,
        }
    }

    /// Feed back the result of a status check.
    ///
    /// `Ok(None)` means nothing visible happened (stale result, a report
    /// tagged with another job's id, or no change). Terminal transitions happen exactly once: polling stops and
    /// any later result for the job is discarded.
    pub fn apply_status(
        &mut self,
        request: StatusRequest,
        result: Result<StatusReport, TransportError>,
        now: Instant,
    ) -> Result<Option<JobEvent>, JobError> {
        let StatusRequest { ticket, job_id } = request;
        let report = match self.scheduler.complete(ticket, now, result) {
            PollOutcome::Applied(report) => report,
            PollOutcome::Stale => return Ok(None),
            PollOutcome::Backoff { attempt, delay, .. } => {
                return Ok(Some(JobEvent::Retrying { attempt, delay }));
            }
            PollOutcome::Exhausted { attempts, error } => {
                self.detach_poll();
                return Err(JobError::PollExhausted { attempts, error });
            }
            PollOutcome::Rejected(error) => {
                self.detach_poll();
                return Err(JobError::Rejected(error));
            }
        };

        let Phase::Tracking { job, poll } = &mut self.phase else {
            return Ok(None);
        };
        if job.id != job_id {
            tracing::warn!(expected = %job.id, got = %job_id, "status for a different job");
            return Ok(None);
        }
        if let Some(reported) = &report.job_id {
            if *reported != job.id {
                // The run already has its next check scheduled; only the report is dropped.
                tracing::warn!(job = %job.id, reported = %reported, "dropping status for another job id");
                return Ok(None);
            }
        }

        match job.apply(&report) {
            Transition::Completed => {
                if let Some(handle) = poll.take() {
                    self.scheduler.stop(handle);
                }
                tracing::info!(job = %job.id, "job completed");
                Ok(Some(JobEvent::Completed(job.clone())))
            }
            Transition::Failed => {
                if let Some(handle) = poll.take() {
                    self.scheduler.stop(handle);
                }
                let error = job.error.clone().unwrap_or_default();
                tracing::warn!(job = %job.id, %error, "job failed");
                Ok(Some(JobEvent::Failed {
                    job_id: job.id.clone(),
                    error,
                }))
            }
            Transition::Progressed => Ok(Some(JobEvent::Progress {
                job_id: job.id.clone(),
                status: job.status,
                progress: job.progress,
            })),
            Transition::Unchanged | Transition::Ignored => Ok(None),
        }
    }

    /// Discard a failed (or stalled) job and resubmit its request. The new
    /// job gets a fresh id and polling epoch; nothing of the old one is
    /// resumed. Also valid right after a failed creation call.
    pub fn retry(&mut self) -> Result<Submission, JobError> {
        let allowed = match &self.phase {
            Phase::Tracking { job, .. } => job.status == JobStatus::Failed || self.is_stalled(),
            Phase::Idle => self.request.is_some(),
            Phase::Submitting { .. } => false,
        };
        let request = match (&self.request, allowed) {
            (Some(request), true) => request.clone(),
            _ => {
                return Err(JobError::InvalidState {
                    action: "retry",
                    state: self.state_name(),
                })
            }
        };
        if let Some(job) = self.job() {
            tracing::info!(job = %job.id, "discarding job for retry");
        }
        self.stop_polling();
        self.phase = Phase::Idle;
        self.submit(request)
    }

    /// Poll a stalled job again under a fresh epoch. Status checks are
    /// idempotent, so the same job id is kept.
    pub fn resume_tracking(&mut self, now: Instant) -> Result<(), JobError> {
        if !self.is_stalled() {
            return Err(JobError::InvalidState {
                action: "resume tracking",
                state: self.state_name(),
            });
        }
        let handle = self.scheduler.start(now);
        if let Phase::Tracking { job, poll } = &mut self.phase {
            tracing::info!(job = %job.id, epoch = %handle.epoch(), "resuming status checks");
            *poll = Some(handle);
        }
        Ok(())
    }

    /// Abandon a job that is being created, queued or processed. Polling
    /// stops and any in-flight result is discarded. Returns the id of the
    /// discarded job, if it had one.
    pub fn cancel(&mut self) -> Result<Option<JobId>, JobError> {
        if !self.is_busy() {
            return Err(JobError::InvalidState {
                action: "cancel",
                state: self.state_name(),
            });
        }
        self.stop_polling();
        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        self.request = None;
        let job_id = match previous {
            Phase::Tracking { job, .. } => Some(job.id),
            _ => None,
        };
        tracing::info!(?job_id, "job cancelled");
        Ok(job_id)
    }

    /// Drop whatever job is held, in any state (the consuming view went away).
    pub fn reset(&mut self) {
        self.stop_polling();
        self.phase = Phase::Idle;
        self.request = None;
    }

    fn stop_polling(&mut self) {
        if let Phase::Tracking { poll, .. } = &mut self.phase {
            if let Some(handle) = poll.take() {
                self.scheduler.stop(handle);
            }
        }
    }

    /// The scheduler already stopped the run; forget the handle.
    fn detach_poll(&mut self) {
        if let Phase::Tracking { poll, .. } = &mut self.phase {
            *poll = None;
        }
    }
}
