//! Criterion micro-benchmarks for field lookups.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use drift_bench::double_gyre;
use drift_core::CellHints;
use drift_test_utils::ramp_field;

/// Benchmark: 10K bilinear lookups on a scalar ramp without hints.
fn bench_scalar_eval_10k(c: &mut Criterion) {
    let field = ramp_field("T");
    let points: Vec<(f64, f64)> = (0..10_000u32)
        .map(|i| (f64::from(i % 100) * 0.099, f64::from(i / 100) * 0.049))
        .collect();

    c.bench_function("scalar_eval_10k", |b| {
        b.iter(|| {
            for &(x, y) in &points {
                black_box(field.eval(0.0, 0.0, y, x).ok());
            }
        });
    });
}

/// Benchmark: a particle walking along a line, sampling the gyre vector
/// field with and without its cached cell.
fn bench_vector_walk(c: &mut Criterion) {
    let fs = double_gyre(100).unwrap();
    let uv = fs.handle("UV").unwrap();
    let path: Vec<(f64, f64)> = (0..10_000u32)
        .map(|i| (0.1 + f64::from(i) * 1.8e-4, 0.5))
        .collect();

    c.bench_function("vector_walk_hinted_10k", |b| {
        b.iter(|| {
            let mut hints = CellHints::default();
            for &(x, y) in &path {
                black_box(fs.sample(uv, 0.0, 0.0, y, x, &mut hints).ok());
            }
        });
    });

    c.bench_function("vector_walk_cold_10k", |b| {
        b.iter(|| {
            for &(x, y) in &path {
                let mut hints = CellHints::default();
                black_box(fs.sample(uv, 0.0, 0.0, y, x, &mut hints).ok());
            }
        });
    });
}

criterion_group!(benches, bench_scalar_eval_10k, bench_vector_walk);
criterion_main!(benches);
