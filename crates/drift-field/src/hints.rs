//! Per-particle cell hint storage as seen by the interpolator.

use drift_core::{CellHint, CellHints, GridId};
use indexmap::IndexSet;

/// Where lookups read and write the last known cell for each grid.
pub trait HintStore {
    /// Hint for `grid`, if one is cached.
    fn get(&self, grid: GridId) -> Option<CellHint>;

    /// Cache a hint for `grid`.
    fn set(&mut self, grid: GridId, hint: CellHint);
}

/// A store that remembers nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHints;

impl HintStore for NoHints {
    fn get(&self, _grid: GridId) -> Option<CellHint> {
        None
    }

    fn set(&mut self, _grid: GridId, _hint: CellHint) {}
}

/// A particle's [`CellHints`] addressed through a field set's grid slots.
pub struct SlotHints<'a> {
    slots: &'a IndexSet<GridId>,
    hints: &'a mut CellHints,
}

impl<'a> SlotHints<'a> {
    pub(crate) fn new(slots: &'a IndexSet<GridId>, hints: &'a mut CellHints) -> Self {
        Self { slots, hints }
    }
}

impl HintStore for SlotHints<'_> {
    fn get(&self, grid: GridId) -> Option<CellHint> {
        self.slots
            .get_index_of(&grid)
            .and_then(|slot| self.hints.get(slot))
    }

    fn set(&mut self, grid: GridId, hint: CellHint) {
        if let Some(slot) = self.slots.get_index_of(&grid) {
            self.hints.set(slot, hint);
        }
    }
}
