//! Bounded-retry periodic executor for status checks.
//!
//! The scheduler never performs I/O itself. The owner asks [`PollingScheduler::tick`]
//! whether a check is due, performs it however it likes, and hands the result
//! back through [`PollingScheduler::complete`] together with the ticket it
//! was given. That keeps the guarantees explicit:
//!
//! - at most one check is in flight; a tick while one is outstanding is
//!   skipped, not queued;
//! - `stop` (or a later `start`) invalidates the epoch, so a late result is
//!   reported as [`PollOutcome::Stale`] and never applied;
//! - transient transport failures back off exponentially up to the retry
//!   cap, terminal ones stop the run at once.

use std::time::{Duration, Instant};

use super::epoch::PollEpoch;
use crate::retry::{classify, RetryDecision, RetryPolicy, TransportError};

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between successful checks.
    pub interval: Duration,
    /// Backoff for transient transport failures of the check itself.
    pub retry: RetryPolicy,
    /// Upper bound on how long one run may keep polling. None = unbounded.
    pub max_duration: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            max_duration: Some(Duration::from_secs(15 * 60)),
        }
    }
}

/// Identifies one run; needed to stop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollHandle {
    epoch: PollEpoch,
}

impl PollHandle {
    pub fn epoch(&self) -> PollEpoch {
        self.epoch
    }
}

/// Permission to perform one check. Hand it back with the result.
#[derive(Debug, PartialEq, Eq)]
pub struct PollTicket {
    epoch: PollEpoch,
    attempt: u32,
}

impl PollTicket {
    pub fn epoch(&self) -> PollEpoch {
        self.epoch
    }

    /// 1 for a regular check, >1 when retrying after transport failures.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Answer to [`PollingScheduler::tick`].
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    /// Perform a check now.
    Due(PollTicket),
    /// Nothing to do for this long.
    Wait(Duration),
    /// A check is outstanding; this tick is skipped.
    InFlight,
    /// No run is active.
    Idle,
    /// The run exceeded `max_duration` and has been stopped.
    TimedOut { elapsed: Duration },
}

/// What happened to a completed check.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// Fresh result; the next check is scheduled one interval out.
    Applied(T),
    /// Result belongs to a stopped or superseded run. Dropped silently.
    Stale,
    /// Transient failure; the check will be retried after `delay`.
    Backoff {
        attempt: u32,
        delay: Duration,
        error: TransportError,
    },
    /// Transient failures hit the attempt cap; the run is stopped.
    Exhausted { attempts: u32, error: TransportError },
    /// Terminal transport failure (e.g. 4xx); the run is stopped.
    Rejected(TransportError),
}

#[derive(Debug)]
struct Run {
    epoch: PollEpoch,
    started_at: Instant,
    next_due: Instant,
    in_flight: bool,
    failures: u32,
}

#[derive(Debug)]
pub struct PollingScheduler {
    settings: PollSettings,
    last_epoch: Option<PollEpoch>,
    run: Option<Run>,
}

impl PollingScheduler {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            last_epoch: None,
            run: None,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Start a new run with the first check due immediately. Any previous
    /// run is superseded and its outstanding result will be discarded.
    pub fn start(&mut self, now: Instant) -> PollHandle {
        let epoch = PollEpoch::after(self.last_epoch);
        self.last_epoch = Some(epoch);
        if let Some(old) = self.run.take() {
            tracing::debug!(old = %old.epoch, new = %epoch, "polling run superseded");
        }
        self.run = Some(Run {
            epoch,
            started_at: now,
            next_due: now,
            in_flight: false,
            failures: 0,
        });
        PollHandle { epoch }
    }

    /// Stop the run identified by `handle`. Returns false if it was no
    /// longer the active run.
    pub fn stop(&mut self, handle: PollHandle) -> bool {
        match &self.run {
            Some(run) if run.epoch == handle.epoch => {
                self.run = None;
                tracing::debug!(epoch = %handle.epoch, "polling stopped");
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<PollHandle> {
        self.run.as_ref().map(|r| PollHandle { epoch: r.epoch })
    }

    pub fn is_running(&self, handle: PollHandle) -> bool {
        self.run.as_ref().is_some_and(|r| r.epoch == handle.epoch)
    }

    pub fn in_flight(&self) -> bool {
        self.run.as_ref().is_some_and(|r| r.in_flight)
    }

    /// Time until the next check is due, if one is waiting.
    pub fn next_due_in(&self, now: Instant) -> Option<Duration> {
        self.run
            .as_ref()
            .filter(|r| !r.in_flight)
            .map(|r| r.next_due.saturating_duration_since(now))
    }

    pub fn tick(&mut self, now: Instant) -> Tick {
        let Some(run) = self.run.as_mut() else {
            return Tick::Idle;
        };
        if run.in_flight {
            return Tick::InFlight;
        }
        let elapsed = now.saturating_duration_since(run.started_at);
        if self.settings.max_duration.is_some_and(|max| elapsed >= max) {
            tracing::warn!(epoch = %run.epoch, elapsed_secs = elapsed.as_secs(), "polling timed out");
            self.run = None;
            return Tick::TimedOut { elapsed };
        }
        if now < run.next_due {
            return Tick::Wait(run.next_due - now);
        }
        run.in_flight = true;
        Tick::Due(PollTicket {
            epoch: run.epoch,
            attempt: run.failures + 1,
        })
    }

    /// Hand back the result of the check `ticket` authorised.
    pub fn complete<T>(
        &mut self,
        ticket: PollTicket,
        now: Instant,
        result: Result<T, TransportError>,
    ) -> PollOutcome<T> {
        let interval = self.settings.interval;
        let policy = self.settings.retry;
        let run = match self.run.as_mut() {
            Some(run) if run.epoch == ticket.epoch => run,
            _ => {
                tracing::debug!(epoch = %ticket.epoch, "discarding stale poll result");
                return PollOutcome::Stale;
            }
        };
        run.in_flight = false;

        let error = match result {
            Ok(value) => {
                run.failures = 0;
                run.next_due = now + interval;
                return PollOutcome::Applied(value);
            }
            Err(e) => e,
        };

        let kind = classify(&error);
        if !kind.is_transient() {
            tracing::warn!(epoch = %run.epoch, "status check rejected: {}", error);
            self.run = None;
            return PollOutcome::Rejected(error);
        }

        run.failures += 1;
        let attempt = run.failures;
        match policy.decide(attempt, kind) {
            RetryDecision::RetryAfter(delay) => {
                run.next_due = now + delay;
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "status check failed: {}", error);
                PollOutcome::Backoff {
                    attempt,
                    delay,
                    error,
                }
            }
            RetryDecision::NoRetry => {
                tracing::warn!(attempts = attempt, "giving up on status checks: {}", error);
                self.run = None;
                PollOutcome::Exhausted {
                    attempts: attempt,
                    error,
                }
            }
        }
    }
}
