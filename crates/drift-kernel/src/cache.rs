//! Compiled-kernel cache keyed by [`KernelSignature`].
//!
//! At most one build runs per signature: concurrent requests for the same
//! key wait on a per-key [`OnceLock`] and all observe the same artifact or
//! the same failure. Failures stay cached until the key is invalidated.
//! Entries are never evicted implicitly.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, trace, warn};

use crate::backend::{CompiledKernel, InterpreterBackend, KernelBackend};
use crate::error::CompileError;
use crate::kernel::{KernelSignature, TranslatedKernel};

type BuildResult = Result<Arc<dyn CompiledKernel>, CompileError>;
type Slot = Arc<OnceLock<BuildResult>>;

/// Counters for one cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Backend builds started.
    pub builds: u64,
    /// Requests served from an existing entry.
    pub hits: u64,
}

/// Shared cache of compiled kernels.
pub struct KernelCache {
    backend: Arc<dyn KernelBackend>,
    slots: Mutex<HashMap<KernelSignature, Slot>>,
    builds: AtomicU64,
    hits: AtomicU64,
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::new(Arc::new(InterpreterBackend))
    }
}

impl fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelCache")
            .field("backend", &self.backend.name())
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl KernelCache {
    /// Empty cache building with `backend`.
    pub fn new(backend: Arc<dyn KernelBackend>) -> Self {
        Self {
            backend,
            slots: Mutex::new(HashMap::new()),
            builds: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Name of the backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<KernelSignature, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the artifact for `kernel`, building it on first request.
    ///
    /// Blocks while another thread builds the same signature.
    pub fn get_or_build(&self, kernel: &TranslatedKernel) -> BuildResult {
        let signature = &kernel.signature;
        let slot = Arc::clone(self.slots().entry(signature.clone()).or_default());

        let mut built = false;
        let result = slot.get_or_init(|| {
            built = true;
            self.builds.fetch_add(1, Ordering::Relaxed);
            debug!(
                signature = %signature,
                backend = self.backend.name(),
                instructions = kernel.program.code.len(),
                "building kernel"
            );
            let result = self.backend.build(&kernel.program, signature);
            if let Err(e) = &result {
                warn!(signature = %signature, error = %e, "kernel build failed");
            }
            result
        });
        if !built {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(signature = %signature, "kernel cache hit");
        }
        result.clone()
    }

    /// Whether an entry (built, building or failed) exists for `signature`.
    pub fn contains(&self, signature: &KernelSignature) -> bool {
        self.slots().contains_key(signature)
    }

    /// Drop the entry for `signature`. Callers holding the artifact keep
    /// it; the next request builds afresh. Returns whether it existed.
    pub fn invalidate(&self, signature: &KernelSignature) -> bool {
        self.slots().remove(signature).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Build and hit counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            builds: self.builds.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use drift_core::VariableSchema;

    fn translated(src: &str) -> TranslatedKernel {
        Kernel::new(src).translate(&VariableSchema::empty()).unwrap()
    }

    #[test]
    fn second_request_is_a_hit() {
        let cache = KernelCache::default();
        let k = translated("fn k(p, fs, t) { p.lon += 1; }");
        let a = cache.get_or_build(&k).unwrap();
        let b = cache.get_or_build(&k).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats(), CacheStats { builds: 1, hits: 1 });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let cache = KernelCache::default();
        let k = translated("fn k(p, fs, t) { p.lon += 1; }");
        let a = cache.get_or_build(&k).unwrap();
        assert!(cache.invalidate(&k.signature));
        assert!(!cache.contains(&k.signature));
        let b = cache.get_or_build(&k).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().builds, 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
