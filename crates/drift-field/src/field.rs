//! Scalar fields: a grid, a time axis and one data snapshot per time.
//!
//! Snapshots are either supplied in memory at build time or pulled from a
//! [`SnapshotSource`] on demand. Deferred fields keep only the snapshots
//! that bracket the current time window, replaced by
//! [`Field::advance_window`] between timesteps.

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use drift_core::{CellHint, SampleError};
use tracing::debug;

use crate::error::FieldError;
use crate::grid::Grid;
use crate::hints::HintStore;
use crate::interp::{interpolate, lerp, Interp};
use crate::search::{locate_sorted, AxisBoundary, Boundaries, CellPos, LocateError};

/// Error type snapshot sources report.
pub type LoadError = Box<dyn StdError + Send + Sync>;

/// Ingestion boundary for fields whose data is loaded lazily.
///
/// Implementations wrap whatever storage backs the field (files, a remote
/// store, a generator). `load` is only called between timesteps and may
/// block.
pub trait SnapshotSource: Send + Sync {
    /// Snapshot times, strictly increasing.
    fn times(&self) -> Vec<f64>;

    /// Produce snapshot `index`, laid out as the field's grid expects.
    fn load(&self, index: usize) -> Result<Vec<f32>, LoadError>;
}

/// Snapshots bracketing one time. `next` carries the later snapshot and
/// its weight when the time falls strictly between two.
pub(crate) struct TimeSlices {
    first: Arc<[f32]>,
    next: Option<(f64, Arc<[f32]>)>,
}

impl TimeSlices {
    /// `f` evaluated on the bracketing snapshots, blended linearly in time.
    pub(crate) fn combine(&self, f: impl Fn(&[f32]) -> f64) -> f64 {
        match &self.next {
            None => f(&self.first),
            Some((frac, next)) => lerp(*frac, || f(&self.first), || f(next)),
        }
    }
}

/// A named scalar quantity over (time, depth, lat, lon).
pub struct Field {
    name: Arc<str>,
    grid: Arc<Grid>,
    times: Vec<f64>,
    snapshots: RwLock<Vec<Option<Arc<[f32]>>>>,
    source: Option<Arc<dyn SnapshotSource>>,
    interp: Interp,
    bounds: Boundaries,
    allow_time_extrapolation: bool,
    time_period: Option<f64>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("grid", &self.grid.id())
            .field("times", &self.times.len())
            .field("deferred", &self.source.is_some())
            .field("interp", &self.interp)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl Field {
    /// Start building a field on `grid`.
    pub fn builder(name: impl Into<String>, grid: Arc<Grid>) -> FieldBuilder {
        FieldBuilder {
            name: name.into(),
            grid,
            times: None,
            snapshots: Vec::new(),
            source: None,
            interp: Interp::default(),
            bounds: Boundaries::default(),
            allow_time_extrapolation: false,
            time_period: None,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared grid.
    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    /// Snapshot times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Interpolation method.
    pub fn interp(&self) -> Interp {
        self.interp
    }

    /// Spatial boundary behaviour.
    pub fn boundaries(&self) -> Boundaries {
        self.bounds
    }

    /// Whether snapshots come from a [`SnapshotSource`].
    pub fn is_deferred(&self) -> bool {
        self.source.is_some()
    }

    /// Indices of the snapshots currently held in memory.
    pub fn loaded_indices(&self) -> Vec<usize> {
        let snaps = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
        snaps
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect()
    }

    /// Sample at `(t, z, y, x)`, starting the cell search from `hint` and
    /// storing the found cell back into it.
    pub fn sample(
        &self,
        t: f64,
        z: f64,
        y: f64,
        x: f64,
        hint: &mut Option<CellHint>,
    ) -> Result<f64, SampleError> {
        let pos = self.locate(z, y, x, hint)?;
        self.value_at(t, &pos)
    }

    /// Sample without a cell hint.
    pub fn eval(&self, t: f64, z: f64, y: f64, x: f64) -> Result<f64, SampleError> {
        self.sample(t, z, y, x, &mut None)
    }

    /// Sample using hints kept in `store`.
    pub fn sample_in(
        &self,
        t: f64,
        z: f64,
        y: f64,
        x: f64,
        store: &mut dyn HintStore,
    ) -> Result<f64, SampleError> {
        let pos = self.locate_in(z, y, x, store)?;
        self.value_at(t, &pos)
    }

    pub(crate) fn locate_in(
        &self,
        z: f64,
        y: f64,
        x: f64,
        store: &mut dyn HintStore,
    ) -> Result<CellPos, SampleError> {
        let grid = self.grid.id();
        let mut hint = store.get(grid);
        let pos = self.locate(z, y, x, &mut hint)?;
        store.set(grid, pos.hint());
        Ok(pos)
    }

    /// Locate a point on this field's grid with its boundaries.
    pub(crate) fn locate(
        &self,
        z: f64,
        y: f64,
        x: f64,
        hint: &mut Option<CellHint>,
    ) -> Result<CellPos, SampleError> {
        match self.grid.locate(z, y, x, &self.bounds, *hint) {
            Ok(pos) => {
                *hint = Some(pos.hint());
                Ok(pos)
            }
            Err(LocateError::OutOfBounds) => Err(SampleError::OutOfBounds {
                field: self.name.clone(),
                lon: x,
                lat: y,
                depth: z,
            }),
            Err(LocateError::Degenerate(reason)) => Err(self.interp_error(reason)),
        }
    }

    /// Time-interpolated value at an already located point.
    pub(crate) fn value_at(&self, t: f64, pos: &CellPos) -> Result<f64, SampleError> {
        let slices = self.time_slices(t)?;
        let v = slices.combine(|data| interpolate(&self.grid, data, pos, self.interp));
        if v.is_finite() {
            Ok(v)
        } else {
            Err(self.interp_error("non-finite value in cell"))
        }
    }

    /// The snapshots bracketing `t` and their weights.
    pub(crate) fn time_slices(&self, t: f64) -> Result<TimeSlices, SampleError> {
        let (lo, hi, frac) = if self.times.len() == 1 {
            (0, 0, 0.0)
        } else {
            let pos = locate_sorted(
                self.times.len(),
                |i| self.times[i],
                t,
                self.time_boundary(),
                None,
            )
            .ok_or_else(|| self.time_error(t))?;
            (pos.lo, pos.hi, pos.frac)
        };

        let snaps = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
        let get = |i: usize| snaps.get(i).cloned().flatten().ok_or_else(|| self.time_error(t));
        if frac <= 0.0 {
            Ok(TimeSlices { first: get(lo)?, next: None })
        } else if frac >= 1.0 {
            Ok(TimeSlices { first: get(hi)?, next: None })
        } else {
            Ok(TimeSlices {
                first: get(lo)?,
                next: Some((frac, get(hi)?)),
            })
        }
    }

    /// Make sure every snapshot needed to sample within `[t0, t1]` (in
    /// either order) is loaded, and release the rest. Returns the number of
    /// snapshots loaded by this call. A no-op for in-memory fields.
    pub fn advance_window(&self, t0: f64, t1: f64) -> Result<usize, FieldError> {
        let Some(source) = &self.source else {
            return Ok(0);
        };
        let n = self.times.len();
        let needed = if self.time_period.is_some() || n == 1 {
            0..=n - 1
        } else {
            let (a, b) = (t0.min(t1), t0.max(t1));
            let at = |i: usize| self.times[i];
            let lo = locate_sorted(n, at, a, AxisBoundary::Extrapolate, None).map_or(0, |p| p.lo);
            let hi = locate_sorted(n, at, b, AxisBoundary::Extrapolate, None)
                .map_or(n - 1, |p| if p.frac > 0.0 { p.hi } else { p.lo });
            lo..=hi
        };

        let mut snaps = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        let mut loaded = 0;
        for (i, slot) in snaps.iter_mut().enumerate() {
            if !needed.contains(&i) {
                *slot = None;
                continue;
            }
            if slot.is_some() {
                continue;
            }
            let data = source.load(i).map_err(|source| FieldError::Load {
                field: self.name.to_string(),
                index: i,
                source,
            })?;
            if data.len() != self.grid.len() {
                return Err(FieldError::SnapshotShape {
                    field: self.name.to_string(),
                    index: i,
                    expected: self.grid.len(),
                    got: data.len(),
                });
            }
            *slot = Some(Arc::from(data));
            loaded += 1;
        }
        if loaded > 0 {
            debug!(field = %self.name, loaded, window = ?needed, "reloaded snapshots");
        }
        Ok(loaded)
    }

    fn time_boundary(&self) -> AxisBoundary {
        match self.time_period {
            Some(period) => AxisBoundary::Periodic { period },
            None if self.allow_time_extrapolation => AxisBoundary::Extrapolate,
            None => AxisBoundary::Bounded,
        }
    }

    fn time_error(&self, t: f64) -> SampleError {
        SampleError::TimeExtrapolation {
            field: self.name.clone(),
            time: t,
            start: self.times[0],
            end: self.times[self.times.len() - 1],
        }
    }

    fn interp_error(&self, reason: &str) -> SampleError {
        SampleError::Interpolation {
            field: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Builder for [`Field`].
pub struct FieldBuilder {
    name: String,
    grid: Arc<Grid>,
    times: Option<Vec<f64>>,
    snapshots: Vec<Arc<[f32]>>,
    source: Option<Arc<dyn SnapshotSource>>,
    interp: Interp,
    bounds: Boundaries,
    allow_time_extrapolation: bool,
    time_period: Option<f64>,
}

impl FieldBuilder {
    /// Snapshot times. Optional for a single snapshot (taken as `[0.0]`).
    pub fn times(mut self, times: Vec<f64>) -> Self {
        self.times = Some(times);
        self
    }

    /// Append one in-memory snapshot.
    pub fn snapshot(mut self, data: impl Into<Arc<[f32]>>) -> Self {
        self.snapshots.push(data.into());
        self
    }

    /// Append a snapshot holding `value` everywhere.
    pub fn constant(mut self, value: f32) -> Self {
        self.snapshots.push(Arc::from(vec![value; self.grid.len()]));
        self
    }

    /// Load snapshots lazily from `source`.
    pub fn source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Spatial interpolation method.
    pub fn interp(mut self, interp: Interp) -> Self {
        self.interp = interp;
        self
    }

    /// Boundary along longitude / x.
    pub fn zonal(mut self, b: AxisBoundary) -> Self {
        self.bounds.zonal = b;
        self
    }

    /// Boundary along latitude / y.
    pub fn meridional(mut self, b: AxisBoundary) -> Self {
        self.bounds.meridional = b;
        self
    }

    /// Boundary along depth.
    pub fn vertical(mut self, b: AxisBoundary) -> Self {
        self.bounds.vertical = b;
        self
    }

    /// Clamp out-of-range times to the nearest snapshot instead of failing.
    pub fn allow_time_extrapolation(mut self, allow: bool) -> Self {
        self.allow_time_extrapolation = allow;
        self
    }

    /// Repeat the time axis with the given period.
    pub fn time_periodic(mut self, period: f64) -> Self {
        self.time_period = Some(period);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Field, FieldError> {
        let name = self.name;
        let grid = self.grid;

        let (times, snapshots) = match self.source.as_ref() {
            Some(_) if !self.snapshots.is_empty() => {
                return Err(FieldError::ConflictingData { field: name });
            }
            Some(source) => {
                let times = source.times();
                let slots = vec![None; times.len()];
                (times, slots)
            }
            None => {
                if self.snapshots.is_empty() {
                    return Err(FieldError::MissingData { field: name });
                }
                let times = match self.times {
                    Some(t) => t,
                    None if self.snapshots.len() == 1 => vec![0.0],
                    None => {
                        return Err(FieldError::InvalidTimes {
                            field: name,
                            reason: "times are required for more than one snapshot".into(),
                        })
                    }
                };
                if times.len() != self.snapshots.len() {
                    return Err(FieldError::SnapshotCount {
                        field: name,
                        expected: times.len(),
                        got: self.snapshots.len(),
                    });
                }
                for (index, s) in self.snapshots.iter().enumerate() {
                    if s.len() != grid.len() {
                        return Err(FieldError::SnapshotShape {
                            field: name,
                            index,
                            expected: grid.len(),
                            got: s.len(),
                        });
                    }
                }
                (times, self.snapshots.into_iter().map(Some).collect())
            }
        };

        if let Err(reason) = check_times(&times) {
            return Err(FieldError::InvalidTimes { field: name, reason });
        }
        if let Err(reason) = check_bounds(&grid, &self.bounds) {
            return Err(FieldError::InvalidBoundary { field: name, reason });
        }
        if let Some(period) = self.time_period {
            let span = times[times.len() - 1] - times[0];
            if !(period.is_finite() && period > 0.0 && period >= span) {
                return Err(FieldError::InvalidTimes {
                    field: name,
                    reason: format!("time period {period} is shorter than the time span {span}"),
                });
            }
        }

        Ok(Field {
            name: Arc::from(name),
            grid,
            times,
            snapshots: RwLock::new(snapshots),
            source: self.source,
            interp: self.interp,
            bounds: self.bounds,
            allow_time_extrapolation: self.allow_time_extrapolation,
            time_period: self.time_period,
        })
    }
}

fn check_times(times: &[f64]) -> Result<(), String> {
    if times.is_empty() {
        return Err("no times".into());
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err("non-finite time".into());
    }
    if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
        return Err(format!("not strictly increasing at index {}", i + 1));
    }
    Ok(())
}

fn check_bounds(grid: &Grid, b: &Boundaries) -> Result<(), String> {
    let check_period = |axis: &str, boundary: AxisBoundary, span: f64| match boundary {
        AxisBoundary::Periodic { period } if !(period.is_finite() && period > 0.0 && period >= span) => {
            Err(format!("{axis} period {period} is shorter than the grid span {span}"))
        }
        _ => Ok(()),
    };
    check_period("zonal", b.zonal, grid.lon_span())?;
    check_period("meridional", b.meridional, grid.lat_span())?;
    if grid.is_curvilinear() && matches!(b.meridional, AxisBoundary::Periodic { .. }) {
        return Err("meridional periodicity is not supported on curvilinear grids".into());
    }
    if matches!(b.vertical, AxisBoundary::Periodic { .. }) {
        return Err("the vertical axis cannot be periodic".into());
    }
    Ok(())
}
