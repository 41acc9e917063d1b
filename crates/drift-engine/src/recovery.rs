//! Registry of recovery kernels keyed by error kind.

use drift_core::ErrorKind;
use drift_kernel::Kernel;
use indexmap::IndexMap;

/// Maps an [`ErrorKind`] to the kernel run when a particle hits it.
///
/// Kinds without a handler escalate to `StopExecution`. A recovery kernel
/// runs on the particle's un-advanced record; returning `Success` retries
/// the step, `Delete` removes the particle and anything else stops the run.
#[derive(Clone, Debug, Default)]
pub struct RecoveryMap {
    handlers: IndexMap<ErrorKind, Kernel>,
}

impl RecoveryMap {
    /// No handlers: every runtime error stops the run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `kernel` for `kind`, replacing any earlier handler.
    pub fn on(mut self, kind: ErrorKind, kernel: impl Into<Kernel>) -> Self {
        self.insert(kind, kernel);
        self
    }

    /// Register `kernel` for every error kind not yet handled.
    pub fn on_any(mut self, kernel: impl Into<Kernel>) -> Self {
        let kernel = kernel.into();
        for kind in ErrorKind::ALL {
            self.handlers.entry(kind).or_insert_with(|| kernel.clone());
        }
        self
    }

    /// Register `kernel` for `kind`, returning the handler it replaced.
    pub fn insert(&mut self, kind: ErrorKind, kernel: impl Into<Kernel>) -> Option<Kernel> {
        self.handlers.insert(kind, kernel.into())
    }

    /// Handler for `kind`.
    pub fn get(&self, kind: ErrorKind) -> Option<&Kernel> {
        self.handlers.get(&kind)
    }

    /// Registered handlers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ErrorKind, &Kernel)> {
        self.handlers.iter().map(|(&k, v)| (k, v))
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
