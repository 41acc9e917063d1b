//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a particle within a particle set.
///
/// Ids are allocated in increasing order and never reused, so a particle
/// keeps its id for its whole lifetime even when others are deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub u64);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticleId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotonic allocator for [`ParticleId`]s.
#[derive(Clone, Debug, Default)]
pub struct ParticleIdAllocator {
    next: u64,
}

impl ParticleIdAllocator {
    /// Allocator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> ParticleId {
        let id = ParticleId(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    pub fn peek(&self) -> ParticleId {
        ParticleId(self.next)
    }
}

/// Counter for unique [`GridId`] allocation.
static GRID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a grid.
///
/// Allocated from a monotonic atomic counter via [`GridId::next`]. Two
/// grids built separately always have different ids, even with identical
/// coordinates. Fields that share one `Arc<Grid>` share its id, and the
/// field set gives each distinct id one cell-hint slot per particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridId(u64);

impl GridId {
    /// Allocate a fresh, unique grid id. Thread-safe.
    pub fn next() -> Self {
        Self(GRID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
