//! Integration test: output cadence, cooperative stop and field windows.

use std::sync::Arc;

use drift_core::{ParticleId, VarType, Variable, VariableSchema};
use drift_engine::{ExecuteConfig, MemoryOutput, ParticleSet, StopHandle, Stepper};
use drift_field::{Field, FieldSet};
use drift_kernel::{Kernel, KernelCache, PrintSink};
use drift_test_utils::{flat_grid, kernels, uniform_flow, CountingSource};

fn one_particle(schema: VariableSchema) -> ParticleSet {
    let mut set = ParticleSet::new(schema);
    set.add(0.0, 0.0, 0.0, 0.0).unwrap();
    set
}

// ── Cadence ──────────────────────────────────────────────────────────

#[test]
fn frames_at_start_and_every_output_interval() {
    let fs = uniform_flow(1.0, 0.0);
    let mut set = one_particle(VariableSchema::empty());
    let cache = KernelCache::default();
    let mut out = MemoryOutput::new();
    let config = ExecuteConfig::default().with_runtime(5.0).with_output_dt(2.0);

    let summary = Stepper::new(&cache)
        .execute(&mut set, &fs, &Kernel::new(kernels::EULER), &config, Some(&mut out))
        .unwrap();

    assert_eq!(out.times(), vec![0.0, 2.0, 4.0]);
    assert_eq!(summary.outputs, 3);
    assert_eq!(out.flushes(), 1);
    let lons: Vec<f64> = out.trajectory(set.ids()[0]).iter().map(|r| r.lon).collect();
    assert_eq!(lons, vec![0.0, 2.0, 4.0]);
}

#[test]
fn output_times_shorter_than_dt_split_the_timestep() {
    let fs = uniform_flow(1.0, 0.0);
    let mut set = one_particle(VariableSchema::empty());
    let cache = KernelCache::default();
    let mut out = MemoryOutput::new();
    let config = ExecuteConfig::default().with_runtime(2.0).with_output_dt(0.5);

    let summary = Stepper::new(&cache)
        .execute(&mut set, &fs, &Kernel::new(kernels::EULER), &config, Some(&mut out))
        .unwrap();

    assert_eq!(out.times(), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    assert_eq!(summary.timesteps, 4);
    assert_eq!(set.lon(), &[2.0]);
    assert_eq!(set.dt(), &[1.0], "the configured dt survives clipping");
}

#[test]
fn records_carry_written_variables_only_and_follow_release() {
    let schema = VariableSchema::builder()
        .variable(Variable::new("age", VarType::F64))
        .variable(Variable::new("scratch", VarType::F64).written(false))
        .build()
        .unwrap();
    let fs = FieldSet::builder().build();
    let mut set = ParticleSet::new(schema);
    let early = set.add(0.0, 0.0, 0.0, 0.0).unwrap();
    let late = set.add(0.0, 0.0, 0.0, 2.0).unwrap();
    let cache = KernelCache::default();
    let mut out = MemoryOutput::new();
    let config = ExecuteConfig::default().with_runtime(3.0).with_output_dt(1.0);

    Stepper::new(&cache)
        .execute(&mut set, &fs, &Kernel::new(kernels::AGE), &config, Some(&mut out))
        .unwrap();

    assert_eq!(out.variables(), &["age".to_string()]);
    let counts: Vec<usize> = out.frames().iter().map(|f| f.records.len()).collect();
    assert_eq!(counts, vec![1, 1, 2, 2]);
    let last = &out.frames()[3].records;
    assert_eq!(last.iter().map(|r| r.id).collect::<Vec<_>>(), vec![early, late]);
    assert_eq!(last[0].vars.as_slice(), &[3.0]);
    assert_eq!(last[1].vars.as_slice(), &[1.0]);
}

// ── Stop handle ──────────────────────────────────────────────────────

/// Requests a stop whenever a kernel prints.
struct StopOnPrint(StopHandle);

impl PrintSink for StopOnPrint {
    fn print(&self, _id: ParticleId, _line: &str) {
        self.0.request();
    }
}

#[test]
fn stop_request_is_honoured_at_the_timestep_boundary() {
    let fs = FieldSet::builder().build();
    let mut set = one_particle(VariableSchema::empty());
    let cache = KernelCache::default();
    let stop = StopHandle::new();
    let stepper = Stepper::new(&cache)
        .with_stop_handle(stop.clone())
        .with_print(Arc::new(StopOnPrint(stop)));
    let kernel = Kernel::new(
        r#"fn k(p, fs, t) {
            if t >= 2 { print("enough"); }
            p.lon += 1;
        }"#,
    );
    let mut out = MemoryOutput::new();

    let summary = stepper
        .execute(
            &mut set,
            &fs,
            &kernel,
            &ExecuteConfig::default().with_runtime(10.0).with_output_dt(1.0),
            Some(&mut out),
        )
        .unwrap();

    // The step that printed still completes.
    assert!(summary.interrupted);
    assert_eq!(summary.timesteps, 3);
    assert_eq!(summary.final_time, 3.0);
    assert_eq!(set.lon(), &[3.0]);
    assert_eq!(out.times(), vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(out.flushes(), 1);

    // The request was consumed.
    assert!(!stepper.stop_handle().is_requested());
}

#[test]
fn stop_requested_before_the_run_ends_it_immediately() {
    let fs = FieldSet::builder().build();
    let mut set = one_particle(VariableSchema::empty());
    let cache = KernelCache::default();
    let stepper = Stepper::new(&cache);
    stepper.stop_handle().request();

    let summary = stepper
        .execute(
            &mut set,
            &fs,
            &Kernel::new("fn k(p, fs, t) { p.lon += 1; }"),
            &ExecuteConfig::default().with_runtime(4.0),
            None,
        )
        .unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.timesteps, 0);
    assert_eq!(set.lon(), &[0.0]);
}

// ── Field windows ────────────────────────────────────────────────────

#[test]
fn deferred_snapshots_load_one_window_at_a_time() {
    let grid = flat_grid([0.0, 10.0], [0.0, 5.0], 1.0);
    let times: Vec<f64> = (0..=10).map(f64::from).collect();
    let source = Arc::new(CountingSource::new(times, grid.len()));
    let field = Field::builder("T", grid).source(source.clone()).build().unwrap();
    let mut b = FieldSet::builder();
    b.add_field(field).unwrap();
    let fs = b.build();

    let schema = VariableSchema::builder()
        .variable(Variable::new("seen", VarType::F64))
        .build()
        .unwrap();
    let mut set = ParticleSet::new(schema);
    set.add(2.0, 2.0, 0.0, 0.0).unwrap();
    let cache = KernelCache::default();

    let summary = Stepper::new(&cache)
        .execute(
            &mut set,
            &fs,
            &Kernel::new("fn k(p, fs, t) { p.seen = fs.T[p]; }"),
            &ExecuteConfig::default().with_runtime(5.0),
            None,
        )
        .unwrap();

    // The last invocation samples at t = 4, where the field holds 4.
    assert_eq!(set.var("seen"), Some(&[4.0][..]));
    assert_eq!(source.loads(), 6);
    assert_eq!(summary.snapshots_loaded, 6);
}
