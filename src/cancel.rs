//! Cooperative cancellation for long-running bidiagonalizations.
//!
//! The driver polls a [`CancellationToken`] immediately after every product with the
//! operator. When the token has fired, the run unwinds and reports
//! [`Status::Aborted`](crate::error::Status::Aborted) instead of returning a partial result.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A cloneable flag shared between the caller and a running computation.
///
/// Clones observe the same state, so a token can be handed to another thread
/// (a UI, a signal handler, a watchdog) and cancelled from there.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
