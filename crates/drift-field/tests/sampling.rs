//! Integration test: field lookups through the public API.
//!
//! Exactness at nodes, constant fields, periodic wrap against bounded
//! domains, composite entries and deferred snapshot windows.

use std::sync::Arc;

use drift_core::{CellHints, ErrorKind, SampleError};
use drift_field::{AxisBoundary, Field, FieldError, FieldSet, Grid};
use drift_test_utils::{axis, flat_grid, ramp_field, ramp_fieldset, ramp_value, CountingSource};
use proptest::prelude::*;

fn periodic_ramp(period: f64) -> Field {
    let lon = axis(0.0, 10.0, 11);
    let lat = axis(0.0, 5.0, 6);
    let data: Vec<f32> = lat
        .iter()
        .flat_map(|&y| lon.iter().map(move |&x| ramp_value(x, y) as f32))
        .collect();
    let grid = Arc::new(Grid::rectilinear(lon, lat).unwrap());
    Field::builder("T", grid)
        .snapshot(data)
        .zonal(AxisBoundary::Periodic { period })
        .build()
        .unwrap()
}

// ── Wrap and bounds ──────────────────────────────────────────────────

#[test]
fn periodic_wrap_returns_the_wrapped_interior_value() {
    let f = periodic_ramp(11.0);
    // Past the last node the cell blends the last and first columns.
    let seam = |y: f64| (ramp_value(10.0, y) + ramp_value(0.0, y)) / 2.0;
    assert!((f.eval(0.0, 0.0, 2.0, 10.5).unwrap() - seam(2.0)).abs() < 1e-9);
    assert!((f.eval(0.0, 0.0, 2.0, -0.5).unwrap() - seam(2.0)).abs() < 1e-9);
    assert!((f.eval(0.0, 0.0, 3.0, 11.5).unwrap() - ramp_value(0.5, 3.0)).abs() < 1e-9);
}

#[test]
fn without_wrap_just_outside_is_out_of_bounds() {
    let f = ramp_field("T");
    let err = f.eval(0.0, 0.0, 2.0, -0.5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
    assert_eq!(err.field(), "T");
    assert!(f.eval(0.0, 0.0, 5.5, 2.0).is_err());
}

#[test]
fn meridional_extrapolation_clamps() {
    let f = Field::builder("T", flat_grid([0.0, 4.0], [0.0, 4.0], 1.0))
        .constant(7.0)
        .meridional(AxisBoundary::Extrapolate)
        .build()
        .unwrap();
    assert_eq!(f.eval(0.0, 0.0, 9.0, 2.0).unwrap(), 7.0);
    assert!(f.eval(0.0, 0.0, 2.0, 9.0).is_err(), "zonal is still bounded");
}

// ── Composites ───────────────────────────────────────────────────────

#[test]
fn summed_and_nested_entries() {
    let coarse = Field::builder("coarse", flat_grid([0.0, 10.0], [0.0, 10.0], 2.0))
        .constant(1.0)
        .build()
        .unwrap();
    let fine = Field::builder("fine", flat_grid([2.0, 4.0], [2.0, 4.0], 0.5))
        .constant(5.0)
        .build()
        .unwrap();
    let mut b = FieldSet::builder();
    b.add_field(coarse).unwrap();
    b.add_field(fine).unwrap();
    b.add_nested("best", &["fine", "coarse"]).unwrap();
    b.add_summed("total", &["fine", "coarse"]).unwrap();
    let fs = b.build();
    assert_eq!(fs.grid_slots(), 2);

    let best = fs.handle("best").unwrap();
    let total = fs.handle("total").unwrap();
    let mut hints = CellHints::default();
    assert_eq!(fs.sample(best, 0.0, 0.0, 3.0, 3.0, &mut hints).unwrap()[0], 5.0);
    assert_eq!(fs.sample(best, 0.0, 0.0, 8.0, 8.0, &mut hints).unwrap()[0], 1.0);
    assert_eq!(fs.sample(total, 0.0, 0.0, 3.0, 3.0, &mut hints).unwrap()[0], 6.0);
    assert!(matches!(
        fs.sample(total, 0.0, 0.0, 8.0, 8.0, &mut hints),
        Err(SampleError::OutOfBounds { .. })
    ));
}

#[test]
fn composites_must_name_existing_entries() {
    let mut b = FieldSet::builder();
    b.add_field(ramp_field("T")).unwrap();
    assert!(b.add_summed("bad", &["T", "missing"]).is_err());
    assert!(b.add_constant("nan", f64::NAN).is_err());
}

// ── Deferred windows ─────────────────────────────────────────────────

#[test]
fn windows_load_lazily_and_release_old_snapshots() {
    let grid = flat_grid([0.0, 3.0], [0.0, 3.0], 1.0);
    let source = Arc::new(CountingSource::new(vec![0.0, 10.0, 20.0, 30.0], grid.len()));
    let f = Field::builder("T", grid).source(source.clone()).build().unwrap();
    assert!(f.is_deferred());
    assert!(f.eval(5.0, 0.0, 1.0, 1.0).is_err(), "nothing loaded yet");

    assert_eq!(f.advance_window(5.0, 15.0).unwrap(), 3);
    assert!((f.eval(5.0, 0.0, 1.0, 1.0).unwrap() - 5.0).abs() < 1e-9);
    assert!((f.eval(15.0, 0.0, 1.0, 1.0).unwrap() - 15.0).abs() < 1e-9);

    assert_eq!(f.advance_window(15.0, 25.0).unwrap(), 1);
    assert_eq!(f.loaded_indices(), vec![1, 2, 3]);
    assert_eq!(source.loads(), 4);
    let err = f.eval(5.0, 0.0, 1.0, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimeExtrapolation);
}

#[test]
fn failed_loads_surface_as_field_errors() {
    let grid = flat_grid([0.0, 3.0], [0.0, 3.0], 1.0);
    let source = Arc::new(CountingSource::new(vec![0.0, 1.0, 2.0], grid.len()).failing_at(2));
    let f = Field::builder("T", grid).source(source).build().unwrap();
    assert!(f.advance_window(0.0, 0.5).is_ok());
    assert!(matches!(
        f.advance_window(1.0, 2.0),
        Err(FieldError::Load { index: 2, .. })
    ));
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ramp_is_exact_at_nodes(i in 0u32..=10, j in 0u32..=5) {
        let fs = ramp_fieldset();
        let t = fs.handle("T").unwrap();
        let (x, y) = (f64::from(i), f64::from(j));
        let got = fs.sample(t, 0.0, 0.0, y, x, &mut CellHints::default()).unwrap()[0];
        prop_assert_eq!(got, ramp_value(x, y));
    }

    #[test]
    fn ramp_is_linear_between_nodes(x in 0.0f64..10.0, y in 0.0f64..5.0) {
        let f = ramp_field("T");
        prop_assert!((f.eval(0.0, 0.0, y, x).unwrap() - ramp_value(x, y)).abs() < 1e-5);
    }

    #[test]
    fn constant_field_is_constant_everywhere_in_domain(
        x in -100.0f64..=100.0,
        y in -50.0f64..=50.0,
        t in -1e6f64..1e6,
    ) {
        let f = Field::builder("C", flat_grid([-100.0, 100.0], [-50.0, 50.0], 10.0))
            .constant(3.5)
            .build()
            .unwrap();
        prop_assert_eq!(f.eval(t, 0.0, y, x).unwrap(), 3.5);
    }

    #[test]
    fn repeated_snapshots_are_constant_in_time(
        value in -1e3f32..1e3,
        t in 0.0f64..=3.0,
        x in 0.0f64..=10.0,
    ) {
        let f = Field::builder("C", flat_grid([0.0, 10.0], [0.0, 5.0], 1.0))
            .times(vec![0.0, 3.0])
            .constant(value)
            .constant(value)
            .build()
            .unwrap();
        prop_assert_eq!(f.eval(t, 0.0, 2.5, x).unwrap(), f64::from(value));
    }
}
