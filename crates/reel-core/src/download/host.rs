//! Host capabilities for retrieving a finished artifact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use super::naming::{sanitize_file_name, temp_path};
use crate::retry::{run_with_retry, RetryPolicy, TransportError};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid artifact reference {reference:?}: {source}")]
    InvalidReference {
        reference: String,
        source: url::ParseError,
    },
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransportError),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("could not open {url}: {message}")]
    Open { url: String, message: String },
}

/// What the surrounding environment can do with an artifact.
pub trait ArtifactHost {
    /// Canonical absolute URL for an artifact reference.
    fn resolve_url(&self, reference: &str) -> Result<String, HostError>;
    /// Save the resource at `url` locally as `file_name`; returns the final path.
    fn save(&self, url: &str, file_name: &str) -> Result<PathBuf, HostError>;
    /// Hand the resource to the desktop's default handler.
    fn open(&self, url: &str) -> Result<(), HostError>;
}

/// Filesystem + HTTP host used by the CLI.
#[derive(Debug, Clone)]
pub struct LocalArtifactHost {
    base: Url,
    download_dir: PathBuf,
    retry: RetryPolicy,
    timeout: Duration,
}

impl LocalArtifactHost {
    /// `base` is the renderer URL relative references are resolved against.
    pub fn new(base: Url, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            base,
            download_dir: download_dir.into(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(3600),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

impl ArtifactHost for LocalArtifactHost {
    fn resolve_url(&self, reference: &str) -> Result<String, HostError> {
        let invalid = |source| HostError::InvalidReference {
            reference: reference.to_string(),
            source,
        };
        let url = match Url::parse(reference) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.base.join(reference).map_err(invalid)?
            }
            Err(e) => return Err(invalid(e)),
        };
        Ok(url.into())
    }

    fn save(&self, url: &str, file_name: &str) -> Result<PathBuf, HostError> {
        fs::create_dir_all(&self.download_dir)?;
        let final_path = self.download_dir.join(sanitize_file_name(file_name));
        let part = temp_path(&final_path);
        tracing::info!(%url, path = %final_path.display(), "saving artifact");

        let fetched = run_with_retry(&self.retry, || fetch_to_file(url, &part, self.timeout));
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part);
                return Err(e.into());
            }
        };
        fs::rename(&part, &final_path)?;
        tracing::info!(bytes, path = %final_path.display(), "artifact saved");
        Ok(final_path)
    }

    fn open(&self, url: &str) -> Result<(), HostError> {
        let status = Command::new("xdg-open")
            .arg(url)
            .status()
            .map_err(|e| HostError::Open {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if !status.success() {
            return Err(HostError::Open {
                url: url.to_string(),
                message: format!("xdg-open exited with {status}"),
            });
        }
        Ok(())
    }
}

/// One GET into `path`, truncating whatever a previous attempt left there.
fn fetch_to_file(url: &str, path: &Path, timeout: Duration) -> Result<u64, TransportError> {
    let mut file = fs::File::create(path)?;
    let mut written = 0u64;
    let mut write_err: Option<io::Error> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.timeout(timeout)?;
    easy.fail_on_error(false)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match file.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                write_err = Some(e);
                // short write aborts the transfer
                Ok(0)
            }
        })?;
        transfer.perform()
    };
    if let Some(e) = write_err {
        return Err(TransportError::Storage(e));
    }
    performed?;

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(TransportError::http(code));
    }
    file.sync_all()?;
    Ok(written)
}
