//! Build coalescing and failure caching.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use drift_core::VariableSchema;
use drift_kernel::{CompileError, Kernel, KernelCache};
use drift_test_utils::{kernels, CountingBackend};

#[test]
fn concurrent_requests_build_once() {
    let backend = Arc::new(CountingBackend::new().with_delay(Duration::from_millis(50)));
    let cache = Arc::new(KernelCache::new(backend.clone()));
    let translated = Kernel::new(kernels::EULER)
        .translate(&VariableSchema::empty())
        .unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            let translated = translated.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_build(&translated).unwrap()
            })
        })
        .collect();
    let artifacts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(backend.builds(), 1);
    assert!(artifacts.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    let stats = cache.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.hits, threads as u64 - 1);
}

#[test]
fn same_composition_twice_is_one_build() {
    let backend = Arc::new(CountingBackend::new());
    let cache = KernelCache::new(backend.clone());
    let schema = VariableSchema::empty();
    let a = (Kernel::new(kernels::EULER) + Kernel::new(kernels::DELETE))
        .translate(&schema)
        .unwrap();
    let b = Kernel::new(kernels::EULER)
        .then(kernels::DELETE)
        .translate(&schema)
        .unwrap();
    cache.get_or_build(&a).unwrap();
    cache.get_or_build(&b).unwrap();
    assert_eq!(backend.builds(), 1);
}

#[test]
fn failures_are_cached_until_invalidated() {
    let backend = Arc::new(CountingBackend::new().failing());
    let cache = KernelCache::new(backend.clone());
    let translated = Kernel::new(kernels::EULER)
        .translate(&VariableSchema::empty())
        .unwrap();

    let first = cache.get_or_build(&translated).unwrap_err();
    let second = cache.get_or_build(&translated).unwrap_err();
    assert_eq!(first, second);
    assert!(matches!(first, CompileError::CompilationFailure { ref backend, .. } if backend == "counting"));
    assert_eq!(backend.builds(), 1);

    assert!(cache.invalidate(&translated.signature));
    assert!(cache.get_or_build(&translated).is_err());
    assert_eq!(backend.builds(), 2);
}
