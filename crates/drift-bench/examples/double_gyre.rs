//! End-to-end advection example.
//!
//! Demonstrates: build field set → seed particles → compose kernels →
//! register recovery → execute with output → inspect trajectories.
//!
//! Run with `RUST_LOG=drift_engine=debug` to see per-timestep events.

use drift_bench::{double_gyre, seed_particles, DOUBLE_GYRE_RK4};
use drift_core::{ErrorKind, VarType, Variable, VariableSchema};
use drift_engine::{ExecuteConfig, MemoryOutput, RecoveryMap, Stepper};
use drift_kernel::{Kernel, KernelCache};
use tracing_subscriber::EnvFilter;

const AGE: &str = "\
fn age(particle, fieldset, time) {
    particle.age += particle.dt;
}";

const DELETE: &str = "\
fn delete_particle(particle, fieldset, time) {
    particle.delete();
}";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Drift Double Gyre Example ===\n");

    let fieldset = double_gyre(100).unwrap();
    let schema = VariableSchema::builder()
        .variable(Variable::new("age", VarType::F32))
        .build()
        .unwrap();
    let mut particles = seed_particles(1_000, 42, schema);

    let kernel = Kernel::new(DOUBLE_GYRE_RK4) + Kernel::new(AGE);
    let recovery = RecoveryMap::new().on(ErrorKind::OutOfBounds, DELETE);
    let cache = KernelCache::default();
    let stepper = Stepper::new(&cache).with_recovery(recovery);

    let config = ExecuteConfig::default()
        .with_dt(0.05)
        .with_runtime(20.0)
        .with_output_dt(5.0)
        .with_seed(42);
    let mut output = MemoryOutput::new();

    let summary = stepper
        .execute(&mut particles, &fieldset, &kernel, &config, Some(&mut output))
        .unwrap();

    println!(
        "  {} timesteps, {} invocations, {} recoveries, {} deleted in {}μs",
        summary.timesteps,
        summary.invocations,
        summary.recoveries,
        summary.deleted,
        summary.elapsed_us,
    );

    for frame in output.frames() {
        let n = frame.records.len().max(1) as f64;
        let mean_lon: f64 = frame.records.iter().map(|r| r.lon).sum::<f64>() / n;
        let mean_lat: f64 = frame.records.iter().map(|r| r.lat).sum::<f64>() / n;
        println!(
            "  t={:>5.1}: particles={:>5}, mean_lon={:>6.3}, mean_lat={:>6.3}",
            frame.time,
            frame.records.len(),
            mean_lon,
            mean_lat,
        );
    }

    if let Some(&first) = particles.ids().first() {
        let track = output.trajectory(first);
        println!("\n  particle {first}: {} recorded positions", track.len());
        for r in track {
            println!("    t={:>5.1} lon={:>6.3} lat={:>6.3}", r.time, r.lon, r.lat);
        }
    }

    let stats = cache.stats();
    println!("\n  cache: {} builds, {} hits", stats.builds, stats.hits);
    println!("\n=== Done ===");
}
