//! Integration test: runtime errors, recovery kernels and escalation.
//!
//! A particle that fails a sample must not move for the failing step.
//! With no handler the run stops after the timestep; with a handler the
//! particle is deleted or retried with the recovery kernel's dt.

use drift_core::{ErrorKind, ParticleState, VariableSchema};
use drift_engine::{ExecuteConfig, ExecuteError, MemoryOutput, ParticleSet, RecoveryMap, Stepper};
use drift_field::FieldSet;
use drift_kernel::{Kernel, KernelCache};
use drift_test_utils::{kernels, uniform_flow};

/// One particle on the eastern edge, one well inside.
fn edge_and_interior() -> ParticleSet {
    let mut set = ParticleSet::new(VariableSchema::empty());
    set.add(100.0, 0.0, 0.0, 0.0).unwrap();
    set.add(0.0, 0.0, 0.0, 0.0).unwrap();
    set
}

#[test]
fn leaving_the_domain_without_a_handler_stops_the_run() {
    let fs = uniform_flow(1.0, 0.0);
    let mut set = edge_and_interior();
    let cache = KernelCache::default();
    let mut out = MemoryOutput::new();
    let config = ExecuteConfig::default().with_runtime(5.0);

    let err = Stepper::new(&cache)
        .execute(&mut set, &fs, &Kernel::new(kernels::RK4), &config, Some(&mut out))
        .unwrap_err();

    match err {
        ExecuteError::Stopped {
            time,
            particle,
            cause,
            summary,
        } => {
            assert_eq!(time, 1.0);
            assert_eq!(particle, set.ids()[0]);
            assert_eq!(cause, Some(ErrorKind::OutOfBounds));
            assert_eq!(summary.timesteps, 1);
            assert_eq!(summary.recoveries, 0);
        }
        other => panic!("expected a stop, got {other:?}"),
    }
    // The edge particle never moved; the interior one finished its step.
    assert_eq!(set.lon(), &[100.0, 1.0]);
    assert_eq!(set.time(), &[0.0, 1.0]);
    assert_eq!(set.state()[0], ParticleState::StopExecution);
    assert_eq!(out.flushes(), 1, "output is flushed before the error surfaces");
}

#[test]
fn a_delete_handler_removes_the_particle() {
    let fs = uniform_flow(1.0, 0.0);
    let mut set = edge_and_interior();
    let keep = set.ids()[1];
    let cache = KernelCache::default();
    let recovery = RecoveryMap::new().on(ErrorKind::OutOfBounds, kernels::DELETE);

    let summary = Stepper::new(&cache)
        .with_recovery(recovery)
        .execute(
            &mut set,
            &fs,
            &Kernel::new(kernels::RK4),
            &ExecuteConfig::default().with_runtime(3.0),
            None,
        )
        .unwrap();

    assert_eq!(summary.recoveries, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(set.ids(), &[keep]);
    assert_eq!(set.lon(), &[3.0]);
}

#[test]
fn a_handler_for_another_kind_does_not_apply() {
    let fs = uniform_flow(1.0, 0.0);
    let mut set = edge_and_interior();
    let cache = KernelCache::default();
    let recovery = RecoveryMap::new().on(ErrorKind::TimeExtrapolation, kernels::DELETE);

    let err = Stepper::new(&cache)
        .with_recovery(recovery)
        .execute(
            &mut set,
            &fs,
            &Kernel::new(kernels::RK4),
            &ExecuteConfig::default().with_runtime(3.0),
            None,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Stopped {
            cause: Some(ErrorKind::OutOfBounds),
            ..
        }
    ));
}

/// Fails whenever the step is longer than 0.3.
const PICKY: &str = "fn picky(p, fs, t) { if p.dt > 0.3 { return Error; } p.lon += p.dt; }";

#[test]
fn retries_with_the_reduced_dt_within_the_same_timestep() {
    let fs = FieldSet::builder().build();
    let mut set = ParticleSet::new(VariableSchema::empty());
    set.add(0.0, 0.0, 0.0, 0.0).unwrap();
    let cache = KernelCache::default();
    let recovery = RecoveryMap::new().on(ErrorKind::Custom, kernels::HALVE_DT);

    let summary = Stepper::new(&cache)
        .with_recovery(recovery)
        .execute(
            &mut set,
            &fs,
            &Kernel::new(PICKY),
            &ExecuteConfig::default().with_runtime(1.0).with_min_dt(0.1),
            None,
        )
        .unwrap();

    // 1 -> 0.5 -> 0.25, then four accepted quarter steps.
    assert_eq!(summary.timesteps, 1);
    assert_eq!(summary.recoveries, 2);
    assert_eq!(summary.invocations, 2 + 4);
    assert_eq!(set.lon(), &[1.0]);
    assert_eq!(set.time(), &[1.0]);
    assert_eq!(set.dt(), &[0.25]);
}

#[test]
fn reduced_dt_is_bounded_by_min_dt_and_attempts_are_bounded() {
    let fs = FieldSet::builder().build();
    let mut set = ParticleSet::new(VariableSchema::empty());
    set.add(0.0, 0.0, 0.0, 0.0).unwrap();
    let cache = KernelCache::default();
    let recovery = RecoveryMap::new().on(ErrorKind::Custom, kernels::HALVE_DT);
    let always = Kernel::new("fn k(p, fs, t) { return Error; }");
    let config = ExecuteConfig::default()
        .with_runtime(1.0)
        .with_min_dt(0.3)
        .with_max_recovery_attempts(5);

    let err = Stepper::new(&cache)
        .with_recovery(recovery)
        .execute(&mut set, &fs, &always, &config, None)
        .unwrap_err();

    let ExecuteError::Stopped { cause, summary, .. } = err else {
        panic!("expected a stop, got {err:?}");
    };
    assert_eq!(cause, Some(ErrorKind::Custom));
    assert_eq!(summary.recoveries, 5);
    assert_eq!(set.dt(), &[0.3]);
    assert_eq!(set.lon(), &[0.0]);
}

#[test]
fn a_failing_recovery_kernel_escalates() {
    let fs = uniform_flow(1.0, 0.0);
    let mut set = edge_and_interior();
    let cache = KernelCache::default();
    let recovery = RecoveryMap::new().on_any("fn still_bad(p, fs, t) { return Error; }");

    let err = Stepper::new(&cache)
        .with_recovery(recovery)
        .execute(
            &mut set,
            &fs,
            &Kernel::new(kernels::RK4),
            &ExecuteConfig::default().with_runtime(1.0),
            None,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Stopped {
            cause: Some(ErrorKind::OutOfBounds),
            ..
        }
    ));
}

#[test]
fn recovery_kernels_are_translated_before_the_run() {
    let fs = uniform_flow(1.0, 0.0);
    let mut set = edge_and_interior();
    let cache = KernelCache::default();
    let recovery = RecoveryMap::new().on(ErrorKind::OutOfBounds, "fn bad(p, fs, t) { p.id = 1; }");

    let err = Stepper::new(&cache)
        .with_recovery(recovery)
        .execute(
            &mut set,
            &fs,
            &Kernel::new(kernels::RK4),
            &ExecuteConfig::default().with_runtime(1.0),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Translate(_)));
    assert_eq!(set.lon(), &[100.0, 0.0]);
}
