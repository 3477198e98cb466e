//! Session state container.
//!
//! State only changes through [`Store::dispatch`], which runs the pure
//! [`reduce`] function over a closed set of [`Action`]s. One `Store` is
//! created per session and passed by reference to whatever needs it.

use serde::Serialize;

use crate::job::{JobStatus, ProductionJob};
use crate::script::Script;
use crate::timeline::PlaybackState;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub script: Option<Script>,
    /// Sum of the loaded script's scene durations, in seconds.
    pub timeline_total: f64,
    pub playback: PlaybackState,
    pub job: Option<ProductionJob>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A script was opened; playback rewinds.
    ScriptLoaded(Script),
    ScriptCleared,
    PlaybackChanged(PlaybackState),
    JobChanged(ProductionJob),
    JobCleared,
    ErrorRaised(String),
    ErrorDismissed,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::ScriptLoaded(_) => "script_loaded",
            Action::ScriptCleared => "script_cleared",
            Action::PlaybackChanged(_) => "playback_changed",
            Action::JobChanged(_) => "job_changed",
            Action::JobCleared => "job_cleared",
            Action::ErrorRaised(_) => "error_raised",
            Action::ErrorDismissed => "error_dismissed",
        }
    }
}

/// Next state for `action`. Never mutates `state`.
pub fn reduce(state: &SessionState, action: Action) -> SessionState {
    let mut next = state.clone();
    match action {
        Action::ScriptLoaded(script) => {
            // NaN and negative sums (unvalidated scene durations) count as empty.
            next.timeline_total = script.scene_duration_sum().max(0.0);
            next.script = Some(script);
            next.playback = PlaybackState::default();
        }
        Action::ScriptCleared => {
            next.script = None;
            next.timeline_total = 0.0;
            next.playback = PlaybackState::default();
        }
        Action::PlaybackChanged(mut playback) => {
            let total = next.timeline_total.max(0.0);
            playback.current_time = playback.current_time.clamp(0.0, total);
            next.playback = playback;
        }
        Action::JobChanged(job) => {
            if job.status == JobStatus::Failed {
                next.last_error = job.error.clone();
            }
            next.job = Some(job);
        }
        Action::JobCleared => next.job = None,
        Action::ErrorRaised(message) => next.last_error = Some(message),
        Action::ErrorDismissed => next.last_error = None,
    }
    next
}

#[derive(Debug, Default)]
pub struct Store {
    state: SessionState,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply `action`; returns true if the state changed.
    pub fn dispatch(&mut self, action: Action) -> bool {
        let name = action.name();
        let next = reduce(&self.state, action);
        let changed = next != self.state;
        if changed {
            tracing::trace!(action = name, "state updated");
            self.state = next;
        }
        changed
    }
}
