//! Criterion micro-benchmarks for kernel translation, caching and invocation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use drift_bench::{double_gyre, DOUBLE_GYRE_RK4};
use drift_core::{ParticleId, ParticleRecord, VariableSchema};
use drift_kernel::{BoundKernel, Kernel, KernelCache, Scratch, TracingPrint};

/// Benchmark: translate the RK4 kernel from source to a linked program.
fn bench_translate_rk4(c: &mut Criterion) {
    let kernel = Kernel::new(DOUBLE_GYRE_RK4);
    let schema = VariableSchema::empty();

    c.bench_function("translate_rk4", |b| {
        b.iter(|| black_box(kernel.translate(&schema).unwrap()));
    });
}

/// Benchmark: cache lookup of an already built artifact.
fn bench_cache_hit(c: &mut Criterion) {
    let cache = KernelCache::default();
    let translated = Kernel::new(DOUBLE_GYRE_RK4)
        .translate(&VariableSchema::empty())
        .unwrap();
    cache.get_or_build(&translated).unwrap();

    c.bench_function("cache_hit", |b| {
        b.iter(|| black_box(cache.get_or_build(&translated).unwrap()));
    });
}

/// Benchmark: 10K RK4 invocations on one particle record.
fn bench_invoke_rk4_10k(c: &mut Criterion) {
    let fs = double_gyre(100).unwrap();
    let schema = VariableSchema::empty();
    let translated = Kernel::new(DOUBLE_GYRE_RK4).translate(&schema).unwrap();
    let compiled = KernelCache::default().get_or_build(&translated).unwrap();
    let bound = BoundKernel::bind(compiled, &fs).unwrap();
    let mut start = ParticleRecord::new(ParticleId(0), 0.5, 0.5, 0.0, 0.0, &schema);
    start.dt = 0.01;

    c.bench_function("invoke_rk4_10k", |b| {
        let mut scratch = Scratch::new();
        b.iter(|| {
            let mut p = start.clone();
            for _ in 0..10_000 {
                black_box(bound.run(&mut p, 0, &TracingPrint, &mut scratch));
            }
            black_box(p.lon)
        });
    });
}

criterion_group!(
    benches,
    bench_translate_rk4,
    bench_cache_hit,
    bench_invoke_rk4_10k
);
criterion_main!(benches);
