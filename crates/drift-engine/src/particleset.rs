//! Columnar particle storage.
//!
//! A [`ParticleSet`] keeps one column per built-in attribute and one per
//! user variable. Ids are allocated in increasing order and removal is
//! stable, so the id column stays sorted and lookups are a binary search.

use std::sync::Arc;

use drift_core::{
    CellHints, ParticleId, ParticleIdAllocator, ParticleRecord, ParticleState, VariableSchema,
};
use smallvec::SmallVec;
use thiserror::Error;

/// Errors raised when adding particles.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ParticleSetError {
    /// A coordinate or the release time is NaN or infinite.
    #[error("particle {what} must be finite, got {value}")]
    NonFinite {
        /// Which input was bad.
        what: &'static str,
        /// The offending value.
        value: f64,
    },
    /// Column inputs to [`ParticleSet::add_many`] have different lengths.
    #[error("position columns have mismatched lengths: {lengths:?}")]
    LengthMismatch {
        /// Lengths of lon, lat, depth and time.
        lengths: [usize; 4],
    },
}

/// A population of particles sharing one [`VariableSchema`].
#[derive(Clone, Debug)]
pub struct ParticleSet {
    schema: Arc<VariableSchema>,
    ids: ParticleIdAllocator,
    id: Vec<ParticleId>,
    lon: Vec<f64>,
    lat: Vec<f64>,
    depth: Vec<f64>,
    time: Vec<f64>,
    dt: Vec<f64>,
    state: Vec<ParticleState>,
    vars: Vec<Vec<f64>>,
    hints: Vec<CellHints>,
}

impl ParticleSet {
    /// An empty set whose particles carry `schema`'s variables.
    pub fn new(schema: impl Into<Arc<VariableSchema>>) -> Self {
        let schema = schema.into();
        let vars = vec![Vec::new(); schema.len()];
        Self {
            schema,
            ids: ParticleIdAllocator::default(),
            id: Vec::new(),
            lon: Vec::new(),
            lat: Vec::new(),
            depth: Vec::new(),
            time: Vec::new(),
            dt: Vec::new(),
            state: Vec::new(),
            vars,
            hints: Vec::new(),
        }
    }

    /// The variable schema.
    pub fn schema(&self) -> &Arc<VariableSchema> {
        &self.schema
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.id.len()
    }

    /// Whether the set holds no particles.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Add one particle released at `time`. Variables take their schema
    /// initial values; `dt` is assigned when a run starts.
    pub fn add(
        &mut self,
        lon: f64,
        lat: f64,
        depth: f64,
        time: f64,
    ) -> Result<ParticleId, ParticleSetError> {
        for (what, value) in [("lon", lon), ("lat", lat), ("depth", depth), ("time", time)] {
            if !value.is_finite() {
                return Err(ParticleSetError::NonFinite { what, value });
            }
        }
        let id = self.ids.allocate();
        self.id.push(id);
        self.lon.push(lon);
        self.lat.push(lat);
        self.depth.push(depth);
        self.time.push(time);
        self.dt.push(0.0);
        self.state.push(ParticleState::Evaluate);
        for (column, var) in self.vars.iter_mut().zip(self.schema.iter()) {
            column.push(var.initial);
        }
        self.hints.push(CellHints::default());
        Ok(id)
    }

    /// Add particles from position columns. Nothing is added if any input
    /// is invalid.
    pub fn add_many(
        &mut self,
        lon: &[f64],
        lat: &[f64],
        depth: &[f64],
        time: &[f64],
    ) -> Result<Vec<ParticleId>, ParticleSetError> {
        let lengths = [lon.len(), lat.len(), depth.len(), time.len()];
        if lengths.iter().any(|&n| n != lon.len()) {
            return Err(ParticleSetError::LengthMismatch { lengths });
        }
        if let Some((what, value)) = [("lon", lon), ("lat", lat), ("depth", depth), ("time", time)]
            .into_iter()
            .flat_map(|(what, col)| col.iter().map(move |&v| (what, v)))
            .find(|(_, v)| !v.is_finite())
        {
            return Err(ParticleSetError::NonFinite { what, value });
        }
        let mut out = Vec::with_capacity(lon.len());
        for i in 0..lon.len() {
            out.push(self.add(lon[i], lat[i], depth[i], time[i])?);
        }
        Ok(out)
    }

    /// Row of a particle id.
    pub fn index_of(&self, id: ParticleId) -> Option<usize> {
        self.id.binary_search(&id).ok()
    }

    /// Ids in row order (ascending).
    pub fn ids(&self) -> &[ParticleId] {
        &self.id
    }

    /// Longitude column.
    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    /// Latitude column.
    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    /// Depth column.
    pub fn depth(&self) -> &[f64] {
        &self.depth
    }

    /// Time column.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Timestep column.
    pub fn dt(&self) -> &[f64] {
        &self.dt
    }

    /// State column.
    pub fn state(&self) -> &[ParticleState] {
        &self.state
    }

    /// Column of a user variable.
    pub fn var(&self, name: &str) -> Option<&[f64]> {
        self.schema
            .index_of(name)
            .and_then(|i| self.vars.get(i))
            .map(Vec::as_slice)
    }

    /// Gather row `i` into a record.
    pub fn record(&self, i: usize) -> ParticleRecord {
        ParticleRecord {
            id: self.id[i],
            lon: self.lon[i],
            lat: self.lat[i],
            depth: self.depth[i],
            time: self.time[i],
            dt: self.dt[i],
            state: self.state[i],
            vars: self.vars.iter().map(|c| c[i]).collect::<SmallVec<_>>(),
            hints: self.hints[i].clone(),
        }
    }

    /// Scatter a record back into row `i`. The id is not changed.
    pub fn store(&mut self, i: usize, rec: &ParticleRecord) {
        debug_assert_eq!(self.id[i], rec.id, "record stored into a foreign row");
        self.lon[i] = rec.lon;
        self.lat[i] = rec.lat;
        self.depth[i] = rec.depth;
        self.time[i] = rec.time;
        self.dt[i] = rec.dt;
        self.state[i] = rec.state;
        for (column, &v) in self.vars.iter_mut().zip(rec.vars.iter()) {
            column[i] = v;
        }
        self.hints[i].clone_from(&rec.hints);
    }

    /// Set the state of row `i`.
    pub fn set_state(&mut self, i: usize, state: ParticleState) {
        self.state[i] = state;
    }

    /// Set the timestep of row `i`.
    pub(crate) fn set_dt(&mut self, i: usize, dt: f64) {
        self.dt[i] = dt;
    }

    /// Iterate over every particle as a record.
    pub fn records(&self) -> impl Iterator<Item = ParticleRecord> + '_ {
        (0..self.len()).map(|i| self.record(i))
    }

    /// Remove every particle in [`ParticleState::Delete`], keeping the
    /// order of the rest. Returns the number removed.
    pub fn remove_deleted(&mut self) -> usize {
        let keep: Vec<bool> = self
            .state
            .iter()
            .map(|&s| s != ParticleState::Delete)
            .collect();
        let removed = keep.iter().filter(|&&k| !k).count();
        if removed == 0 {
            return 0;
        }
        retain_by(&mut self.id, &keep);
        retain_by(&mut self.lon, &keep);
        retain_by(&mut self.lat, &keep);
        retain_by(&mut self.depth, &keep);
        retain_by(&mut self.time, &keep);
        retain_by(&mut self.dt, &keep);
        retain_by(&mut self.state, &keep);
        for column in &mut self.vars {
            retain_by(column, &keep);
        }
        retain_by(&mut self.hints, &keep);
        removed
    }
}

fn retain_by<T>(column: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    column.retain(|_| flags.next().copied().unwrap_or(true));
}
