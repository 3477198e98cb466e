//! Job record and status.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::renderer::StatusReport;

/// Renderer-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        JobId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Lifecycle status. Only ever advances Queued → Processing → Completed|Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Still being worked on by the renderer.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One production request tracked from submission to terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Percent complete, 0..=100. Never goes down.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Effect of folding one status report into a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Nothing visible changed.
    Unchanged,
    /// Status or progress moved forward.
    Progressed,
    Completed,
    Failed,
    /// The job was already terminal; the report was ignored.
    Ignored,
}

impl ProductionJob {
    pub fn queued(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            artifact_ref: None,
            cloud_artifact_ref: None,
            error: None,
        }
    }

    /// Job record as of a single status report (no tracking history).
    pub fn from_report(id: JobId, report: &StatusReport) -> Self {
        let mut job = Self::queued(id);
        job.apply(report);
        job
    }

    pub(crate) fn apply(&mut self, report: &StatusReport) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored;
        }
        match report.status {
            JobStatus::Completed => {
                self.status = JobStatus::Completed;
                self.progress = 100;
                self.artifact_ref = report.artifact_ref.clone();
                self.cloud_artifact_ref = report.cloud_artifact_ref.clone();
                Transition::Completed
            }
            JobStatus::Failed => {
                self.status = JobStatus::Failed;
                self.error = Some(
                    report
                        .error
                        .clone()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| "render failed".to_string()),
                );
                Transition::Failed
            }
            next => {
                let before = (self.status, self.progress);
                if next.rank() < self.status.rank() {
                    tracing::warn!(job = %self.id, from = %self.status, to = %next, "ignoring status regression");
                } else {
                    self.status = next;
                }
                let reported = clamp_progress(report.progress);
                if reported < self.progress {
                    tracing::debug!(job = %self.id, reported, kept = self.progress, "progress went backwards");
                }
                self.progress = self.progress.max(reported);
                if (self.status, self.progress) == before {
                    Transition::Unchanged
                } else {
                    Transition::Progressed
                }
            }
        }
    }
}

fn clamp_progress(raw: Option<f64>) -> u8 {
    match raw {
        Some(p) if p.is_finite() => p.clamp(0.0, 100.0).round() as u8,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ProductionJob {
        ProductionJob::queued(JobId::new("v1"))
    }

    #[test]
    fn status_serde_is_lowercase() {
        let s: JobStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(s, JobStatus::Processing);
        assert!(serde_json::from_str::<JobStatus>("\"rendering\"").is_err());
        assert_eq!(serde_json::to_string(&JobStatus::Failed).unwrap(), "\"failed\"");
    }

    #[test]
    fn progress_never_regresses() {
        let mut j = job();
        assert_eq!(
            j.apply(&StatusReport::processing(55.0)),
            Transition::Progressed
        );
        assert_eq!(j.apply(&StatusReport::processing(40.0)), Transition::Unchanged);
        assert_eq!(j.progress, 55);
        assert_eq!(j.status, JobStatus::Processing);
    }

    #[test]
    fn progress_is_clamped_into_percent_range() {
        let mut j = job();
        j.apply(&StatusReport::processing(250.0));
        assert_eq!(j.progress, 100);
        let mut k = job();
        k.apply(&StatusReport::processing(-1.0));
        assert_eq!(k.progress, 0);
    }

    #[test]
    fn status_regression_is_ignored() {
        let mut j = job();
        j.apply(&StatusReport::processing(10.0));
        let mut back = StatusReport::processing(20.0);
        back.status = JobStatus::Queued;
        assert_eq!(j.apply(&back), Transition::Progressed);
        assert_eq!(j.status, JobStatus::Processing);
        assert_eq!(j.progress, 20);
    }

    #[test]
    fn terminal_is_sticky() {
        let mut j = job();
        assert_eq!(
            j.apply(&StatusReport::completed().with_artifact("x")),
            Transition::Completed
        );
        assert_eq!(j.progress, 100);
        assert_eq!(j.artifact_ref.as_deref(), Some("x"));
        assert_eq!(
            j.apply(&StatusReport::failed("late failure")),
            Transition::Ignored
        );
        assert_eq!(
            j.apply(&StatusReport::completed().with_artifact("y")),
            Transition::Ignored
        );
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.artifact_ref.as_deref(), Some("x"));
    }

    #[test]
    fn failure_without_message_gets_default() {
        let mut j = job();
        let mut report = StatusReport::failed("");
        report.error = None;
        j.apply(&report);
        assert_eq!(j.error.as_deref(), Some("render failed"));
    }

    #[test]
    fn from_report_reflects_single_snapshot() {
        let done = ProductionJob::from_report(
            JobId::new("v9"),
            &StatusReport::completed().with_cloud_artifact("https://cdn/v9.mp4"),
        );
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.cloud_artifact_ref.as_deref(), Some("https://cdn/v9.mp4"));
        let busy = ProductionJob::from_report(JobId::new("v9"), &StatusReport::processing(33.4));
        assert_eq!((busy.status, busy.progress), (JobStatus::Processing, 33));
    }
}
