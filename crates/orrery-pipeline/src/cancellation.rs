//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use orrery_types::{OrreryError, OrreryResult};

/// Shared cancellation flag.
///
/// Clones observe the same flag. The executor polls it at stage and group
/// boundaries and before each sequential CPU member; work already fanned
/// out is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> OrreryResult<()> {
        if self.is_cancelled() {
            Err(OrreryError::Cancelled)
        } else {
            Ok(())
        }
    }
}
