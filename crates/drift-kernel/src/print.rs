//! Destinations for kernel `print` statements.

use std::sync::{Mutex, PoisonError};

use drift_core::ParticleId;

/// Receives lines printed by kernels. Called concurrently from worker
/// threads during parallel evaluation.
pub trait PrintSink: Send + Sync {
    /// One rendered line from particle `id`.
    fn print(&self, id: ParticleId, line: &str);
}

/// Forwards prints as `tracing` events on the `drift::print` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPrint;

impl PrintSink for TracingPrint {
    fn print(&self, id: ParticleId, line: &str) {
        tracing::info!(target: "drift::print", particle = %id, "{line}");
    }
}

/// Collects printed lines in memory.
#[derive(Debug, Default)]
pub struct CapturedPrint {
    lines: Mutex<Vec<(ParticleId, String)>>,
}

impl CapturedPrint {
    /// Empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain captured lines, in arrival order.
    pub fn take(&self) -> Vec<(ParticleId, String)> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Captured text only, sorted by particle id then arrival.
    pub fn lines_by_particle(&self) -> Vec<String> {
        let mut lines = self.take();
        lines.sort_by_key(|(id, _)| *id);
        lines.into_iter().map(|(_, l)| l).collect()
    }
}

impl PrintSink for CapturedPrint {
    fn print(&self, id: ParticleId, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, line.to_string()));
    }
}
