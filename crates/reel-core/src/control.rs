//! Cooperative cancellation for a running job driver.
//!
//! The driver holds one end of a [`CancelToken`]; the CLI (Ctrl-C handler)
//! or an embedding application holds a clone and calls [`CancelToken::cancel`].
//! The driver checks the token between status checks and stops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancel flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::Relaxed) {
            tracing::debug!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the token can drive another job.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}
