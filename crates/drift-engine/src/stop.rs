//! Cooperative cancellation of a running execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked by the stepper once per outer timestep.
///
/// Cloning yields another handle to the same flag, so a handle can be
/// moved to another thread (or into a [`PrintSink`](drift_kernel::PrintSink))
/// while the run holds the original. A request is consumed when the
/// stepper honours it.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// A handle with no pending request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at the next timestep boundary.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a request is pending.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume a pending request, returning whether there was one.
    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
