//! Retrieval actions for a completed job's artifact.
//!
//! [`DownloadCoordinator`] only ever acts on a job whose status is
//! `Completed`; everything else is refused with [`DownloadError::NotCompleted`].
//! How a resource is saved, linked or opened is up to the [`ArtifactHost`].

mod host;
mod naming;

pub use host::{ArtifactHost, HostError, LocalArtifactHost};
pub use naming::{sanitize_file_name, suggested_file_name, temp_path};

use std::path::PathBuf;

use thiserror::Error;

use crate::job::{JobId, JobStatus, ProductionJob};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("job {job_id} is {status}, not completed")]
    NotCompleted { job_id: JobId, status: JobStatus },
    #[error("job {job_id} completed without an artifact reference")]
    NoArtifact { job_id: JobId },
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// Object-storage copy of the artifact.
    Cloud,
    /// Served by the renderer itself.
    Local,
}

/// Where to fetch a completed artifact from. Only obtainable from a
/// completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    reference: String,
    kind: LocatorKind,
}

impl ArtifactLocator {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }
}

#[derive(Debug)]
pub struct DownloadCoordinator<H> {
    host: H,
    ready: Option<ProductionJob>,
}

impl<H: ArtifactHost> DownloadCoordinator<H> {
    pub fn new(host: H) -> Self {
        Self { host, ready: None }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Record a job that reached `Completed`. Returns false (and keeps the
    /// current state) for a job that is not completed or is already recorded.
    pub fn artifact_ready(&mut self, job: &ProductionJob) -> bool {
        if job.status != JobStatus::Completed {
            tracing::warn!(job = %job.id, status = %job.status, "ignoring artifact for unfinished job");
            return false;
        }
        if self.ready.as_ref().is_some_and(|r| r.id == job.id) {
            return false;
        }
        tracing::info!(
            job = %job.id,
            local = job.artifact_ref.is_some(),
            cloud = job.cloud_artifact_ref.is_some(),
            "artifact ready"
        );
        self.ready = Some(job.clone());
        true
    }

    /// The most recently completed job, if any.
    pub fn ready(&self) -> Option<&ProductionJob> {
        self.ready.as_ref()
    }

    pub fn clear(&mut self) {
        self.ready = None;
    }

    /// Cloud copy when present, else the renderer-hosted one.
    pub fn primary_locator(&self, job: &ProductionJob) -> Result<ArtifactLocator, DownloadError> {
        ensure_completed(job)?;
        if let Some(reference) = &job.cloud_artifact_ref {
            return Ok(ArtifactLocator {
                reference: reference.clone(),
                kind: LocatorKind::Cloud,
            });
        }
        match &job.artifact_ref {
            Some(reference) => Ok(ArtifactLocator {
                reference: reference.clone(),
                kind: LocatorKind::Local,
            }),
            None => Err(DownloadError::NoArtifact {
                job_id: job.id.clone(),
            }),
        }
    }

    /// Save the artifact behind `locator` under `suggested_name`. Repeating
    /// the call saves again.
    pub fn trigger_save(
        &self,
        locator: &ArtifactLocator,
        suggested_name: &str,
    ) -> Result<PathBuf, DownloadError> {
        let url = self.host.resolve_url(&locator.reference)?;
        Ok(self.host.save(&url, suggested_name)?)
    }

    /// Save a completed job's primary artifact under its default name.
    pub fn save_job(&self, job: &ProductionJob) -> Result<PathBuf, DownloadError> {
        let locator = self.primary_locator(job)?;
        self.trigger_save(&locator, &suggested_file_name(&job.id))
    }

    /// Canonical absolute URL of the artifact, independent of the locator
    /// used for saving: the renderer-hosted reference, else the cloud one.
    pub fn copy_share_link(&self, job: &ProductionJob) -> Result<String, DownloadError> {
        ensure_completed(job)?;
        let reference = job
            .artifact_ref
            .as_deref()
            .or(job.cloud_artifact_ref.as_deref())
            .ok_or_else(|| DownloadError::NoArtifact {
                job_id: job.id.clone(),
            })?;
        Ok(self.host.resolve_url(reference)?)
    }

    /// Open the primary artifact with the host's default handler; returns the URL opened.
    pub fn open_external(&self, job: &ProductionJob) -> Result<String, DownloadError> {
        let locator = self.primary_locator(job)?;
        let url = self.host.resolve_url(&locator.reference)?;
        self.host.open(&url)?;
        Ok(url)
    }
}

fn ensure_completed(job: &ProductionJob) -> Result<(), DownloadError> {
    if job.status == JobStatus::Completed {
        Ok(())
    } else {
        Err(DownloadError::NotCompleted {
            job_id: job.id.clone(),
            status: job.status,
        })
    }
}
