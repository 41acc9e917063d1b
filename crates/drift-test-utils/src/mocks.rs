//! Instrumented implementations of the ingestion and backend seams.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use drift_field::{LoadError, SnapshotSource};
use drift_kernel::{
    CompileError, CompiledKernel, InterpreterBackend, KernelBackend, KernelSignature, Program,
};

/// Snapshot source whose snapshot `i` holds `times[i]` at every node, so a
/// field backed by it samples to the time itself. Counts loads.
pub struct CountingSource {
    times: Vec<f64>,
    nodes: usize,
    fail_at: Option<usize>,
    loads: AtomicUsize,
}

impl CountingSource {
    pub fn new(times: Vec<f64>, nodes: usize) -> Self {
        Self {
            times,
            nodes,
            fail_at: None,
            loads: AtomicUsize::new(0),
        }
    }

    /// Fail when snapshot `index` is requested.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Loads performed so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for CountingSource {
    fn times(&self) -> Vec<f64> {
        self.times.clone()
    }

    fn load(&self, index: usize) -> Result<Vec<f32>, LoadError> {
        if self.fail_at == Some(index) {
            return Err(Box::new(io::Error::new(
                io::ErrorKind::NotFound,
                format!("snapshot {index} missing"),
            )));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.times[index] as f32; self.nodes])
    }
}

/// Interpreter backend that counts builds and can be slowed down or made
/// to fail.
#[derive(Default)]
pub struct CountingBackend {
    builds: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every build.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reject every program.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Builds performed so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl KernelBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn build(
        &self,
        program: &Arc<Program>,
        signature: &KernelSignature,
    ) -> Result<Arc<dyn CompiledKernel>, CompileError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail {
            return Err(CompileError::CompilationFailure {
                signature: signature.fingerprint(),
                backend: self.name().to_string(),
                reason: "rejected by test backend".into(),
            });
        }
        InterpreterBackend.build(program, signature)
    }
}
