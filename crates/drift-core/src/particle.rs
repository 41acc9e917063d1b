//! The per-particle record kernels operate on.

use smallvec::SmallVec;

use crate::id::ParticleId;
use crate::schema::{Builtin, VariableSchema};
use crate::status::ParticleState;

/// Last known cell of a particle on one grid.
///
/// `zi` is 0 on grids without a vertical axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellHint {
    /// Column index (lon / x).
    pub xi: u32,
    /// Row index (lat / y).
    pub yi: u32,
    /// Layer index (depth / z).
    pub zi: u32,
}

/// Cell hints for every grid slot of a field set.
///
/// Private to one particle: reads and writes never cross particles, so
/// hints need no synchronisation. Slots that were never written read as
/// `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellHints {
    slots: SmallVec<[Option<CellHint>; 2]>,
}

impl CellHints {
    /// Hints with `n` empty slots.
    pub fn with_slots(n: usize) -> Self {
        Self {
            slots: SmallVec::from_elem(None, n),
        }
    }

    /// Hint stored in a slot, if any.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<CellHint> {
        self.slots.get(slot).copied().flatten()
    }

    /// Store a hint, growing the slot list if needed.
    #[inline]
    pub fn set(&mut self, slot: usize, hint: CellHint) {
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(hint);
    }

    /// Forget every hint.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One particle's full state, as seen by a kernel invocation.
///
/// The stepper hands kernels a working copy of this record and commits it
/// back only when the invocation succeeds.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleRecord {
    /// Unique id.
    pub id: ParticleId,
    /// Longitude (or x).
    pub lon: f64,
    /// Latitude (or y).
    pub lat: f64,
    /// Depth (or z).
    pub depth: f64,
    /// Current particle time.
    pub time: f64,
    /// Signed timestep.
    pub dt: f64,
    /// Lifecycle state.
    pub state: ParticleState,
    /// User variables in schema slot order.
    pub vars: SmallVec<[f64; 8]>,
    /// Cached cell indices per grid slot.
    pub hints: CellHints,
}

impl ParticleRecord {
    /// A fresh record with the schema's initial values.
    pub fn new(
        id: ParticleId,
        lon: f64,
        lat: f64,
        depth: f64,
        time: f64,
        schema: &VariableSchema,
    ) -> Self {
        Self {
            id,
            lon,
            lat,
            depth,
            time,
            dt: 0.0,
            state: ParticleState::Evaluate,
            vars: schema.initial_values().collect(),
            hints: CellHints::default(),
        }
    }

    /// Read a built-in attribute.
    #[inline]
    pub fn builtin(&self, b: Builtin) -> f64 {
        match b {
            Builtin::Lon => self.lon,
            Builtin::Lat => self.lat,
            Builtin::Depth => self.depth,
            Builtin::Time => self.time,
            Builtin::Dt => self.dt,
            Builtin::Id => self.id.0 as f64,
        }
    }

    /// Write a built-in attribute. Read-only attributes are left untouched
    /// and `false` is returned.
    #[inline]
    pub fn set_builtin(&mut self, b: Builtin, v: f64) -> bool {
        match b {
            Builtin::Lon => self.lon = v,
            Builtin::Lat => self.lat = v,
            Builtin::Depth => self.depth = v,
            Builtin::Dt => self.dt = v,
            Builtin::Time | Builtin::Id => return false,
        }
        true
    }
}
