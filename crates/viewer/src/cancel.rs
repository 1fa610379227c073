//! Session-scoped cancellation for queued render work.
//!
//! Every viewing session hands one token to the jobs it submits. Closing or
//! reopening the viewer cancels the token, and the render worker skips any
//! job whose token is cancelled by the time it reaches the front of the
//! queue. Jobs already running always finish; their results are dropped as
//! stale by the viewer state.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared cancellation flag for the jobs of one viewing session.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancels the current token and installs a fresh one for the next
    /// session.
    pub fn rotate(&mut self) {
        self.cancel();
        *self = Self::new();
    }
}
