//! Remote renderer contract.
//!
//! Two operations: create a job from a [`ProductionRequest`], and read a
//! job's status. Implementations are blocking; async callers go through
//! `spawn_blocking`.

mod http;

pub use http::HttpRenderer;

use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobStatus};
use crate::retry::TransportError;
use crate::script::ProductionRequest;

pub trait Renderer: Send + Sync {
    fn create_job(&self, request: &ProductionRequest) -> Result<CreatedJob, TransportError>;
    fn job_status(&self, job_id: &JobId) -> Result<StatusReport, TransportError>;
}

/// Response to a creation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedJob {
    #[serde(rename = "video_id")]
    pub job_id: JobId,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// One status observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default, rename = "video_id", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    /// Percent; may be missing, fractional, or out of range on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Renderer-hosted artifact, usually a path relative to the renderer.
    #[serde(default, rename = "download_url", skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, rename = "cloud_url", skip_serializing_if = "Option::is_none")]
    pub cloud_artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn new(status: JobStatus) -> Self {
        Self {
            job_id: None,
            status,
            progress: None,
            artifact_ref: None,
            cloud_artifact_ref: None,
            preview_url: None,
            error: None,
        }
    }

    pub fn processing(progress: f64) -> Self {
        Self {
            progress: Some(progress),
            ..Self::new(JobStatus::Processing)
        }
    }

    pub fn completed() -> Self {
        Self {
            progress: Some(100.0),
            ..Self::new(JobStatus::Completed)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(JobStatus::Failed)
        }
    }

    pub fn with_job_id(mut self, id: JobId) -> Self {
        self.job_id = Some(id);
        self
    }

    pub fn with_artifact(mut self, reference: impl Into<String>) -> Self {
        self.artifact_ref = Some(reference.into());
        self
    }

    pub fn with_cloud_artifact(mut self, reference: impl Into<String>) -> Self {
        self.cloud_artifact_ref = Some(reference.into());
        self
    }
}
