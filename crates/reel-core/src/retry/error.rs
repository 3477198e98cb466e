//! Transport error type for retry classification.

use thiserror::Error;

/// Error returned by a single call to the renderer or an artifact transfer.
/// Kept separate from job-level errors so it can be classified before it is
/// surfaced.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Curl reported an error (timeout, connection, DNS, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {status}{}", fmt_detail(.detail))]
    Http { status: u32, detail: Option<String> },
    /// Response body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
    /// Local write failed while saving an artifact. Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// The blocking task running the call panicked or was aborted.
    #[error("transfer task: {0}")]
    Task(String),
}

impl TransportError {
    pub fn http(status: u32) -> Self {
        TransportError::Http {
            status,
            detail: None,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u32> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn fmt_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}
