//! Retry and backoff policy.
//!
//! This module encapsulates transport error classification (timeouts,
//! throttling, connection failures, terminal HTTP statuses) and exponential
//! backoff decisions so that the polling scheduler and artifact saves share a
//! consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::TransportError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
