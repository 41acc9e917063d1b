//! Criterion benchmarks for whole-population stepping.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use drift_bench::{double_gyre, seed_particles, DOUBLE_GYRE_RK4};
use drift_core::VariableSchema;
use drift_engine::{ExecuteConfig, Stepper};
use drift_kernel::{Kernel, KernelCache};

/// Benchmark: 10K particles, 10 RK4 timesteps, sequential vs rayon.
fn bench_execute_10k(c: &mut Criterion) {
    let fs = double_gyre(100).unwrap();
    let kernel = Kernel::new(DOUBLE_GYRE_RK4);
    let cache = KernelCache::default();
    let base = ExecuteConfig::default().with_dt(0.1).with_runtime(1.0);

    for (name, parallel) in [("execute_10k_sequential", false), ("execute_10k_parallel", true)] {
        let mut config = base.clone();
        config.parallel = parallel;
        c.bench_function(name, |b| {
            b.iter_batched(
                || seed_particles(10_000, 42, VariableSchema::empty()),
                |mut set| {
                    let summary = Stepper::new(&cache)
                        .execute(&mut set, &fs, &kernel, &config, None)
                        .unwrap();
                    black_box(summary)
                },
                BatchSize::LargeInput,
            );
        });
    }
}

criterion_group!(benches, bench_execute_10k);
criterion_main!(benches);
