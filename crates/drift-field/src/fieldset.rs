//! The field set kernels sample from.
//!
//! A [`FieldSet`] is immutable once built: an ordered name → entry map, a
//! table of named constants, and one hint slot per distinct grid. Only the
//! snapshot windows of deferred fields change, and only through
//! [`FieldSet::advance_window`] between timesteps.

use std::sync::Arc;

use drift_core::{CellHints, GridId, SampleError};
use indexmap::{IndexMap, IndexSet};
use smallvec::{smallvec, SmallVec};

use crate::error::FieldError;
use crate::field::Field;
use crate::hints::{HintStore, SlotHints};
use crate::vector::VectorField;

/// Components returned by one lookup: 1 for scalars, 2 or 3 for vectors.
pub type Sample = SmallVec<[f64; 3]>;

/// One named entry of a field set.
#[derive(Clone, Debug)]
pub enum FieldEntry {
    /// A scalar field.
    Scalar(Arc<Field>),
    /// A vector field.
    Vector(Arc<VectorField>),
    /// Elementwise sum of the constituents. Fails if any constituent fails.
    Summed(Vec<FieldEntry>),
    /// First constituent, in priority order, that samples successfully.
    /// Fails with the last constituent's error if none does.
    Nested(Vec<FieldEntry>),
}

impl FieldEntry {
    /// Number of components a lookup returns.
    pub fn components(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector(v) => v.components(),
            Self::Summed(parts) | Self::Nested(parts) => {
                parts.first().map_or(0, FieldEntry::components)
            }
        }
    }

    /// Sample at `(t, z, y, x)`.
    pub fn sample(
        &self,
        t: f64,
        z: f64,
        y: f64,
        x: f64,
        hints: &mut dyn HintStore,
    ) -> Result<Sample, SampleError> {
        match self {
            Self::Scalar(f) => Ok(smallvec![f.sample_in(t, z, y, x, hints)?]),
            Self::Vector(v) => v.sample(t, z, y, x, hints),
            Self::Summed(parts) => {
                let mut acc: Sample = smallvec![0.0; self.components()];
                for part in parts {
                    let s = part.sample(t, z, y, x, hints)?;
                    acc.iter_mut().zip(s).for_each(|(a, v)| *a += v);
                }
                Ok(acc)
            }
            Self::Nested(parts) => {
                let mut last = None;
                for part in parts {
                    match part.sample(t, z, y, x, hints) {
                        Ok(s) => return Ok(s),
                        Err(e) => last = Some(e),
                    }
                }
                Err(last.unwrap_or_else(|| SampleError::Interpolation {
                    field: Arc::from("<nested>"),
                    reason: "no constituents".to_string(),
                }))
            }
        }
    }

    fn collect_fields(&self, out: &mut Vec<Arc<Field>>) {
        match self {
            Self::Scalar(f) => push_unique(out, f),
            Self::Vector(v) => v.fields().for_each(|f| push_unique(out, f)),
            Self::Summed(parts) | Self::Nested(parts) => {
                parts.iter().for_each(|p| p.collect_fields(out))
            }
        }
    }
}

fn push_unique(out: &mut Vec<Arc<Field>>, f: &Arc<Field>) {
    if !out.iter().any(|g| Arc::ptr_eq(g, f)) {
        out.push(f.clone());
    }
}

/// Handle to an entry, resolved once by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldHandle(usize);

impl FieldHandle {
    /// Position of the entry in the set.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Immutable collection of named fields and constants.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    entries: IndexMap<String, FieldEntry>,
    constants: IndexMap<String, f64>,
    slots: IndexSet<GridId>,
    fields: Vec<Arc<Field>>,
}

impl FieldSet {
    /// Start building a field set.
    pub fn builder() -> FieldSetBuilder {
        FieldSetBuilder::default()
    }

    /// Resolve an entry name.
    pub fn handle(&self, name: &str) -> Option<FieldHandle> {
        self.entries.get_index_of(name).map(FieldHandle)
    }

    /// Entry by name.
    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.entries.get(name)
    }

    /// Entry names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Component count of an entry.
    pub fn components(&self, handle: FieldHandle) -> usize {
        self.entries
            .get_index(handle.0)
            .map_or(0, |(_, e)| e.components())
    }

    /// Named constant.
    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }

    /// All constants in insertion order.
    pub fn constants(&self) -> impl Iterator<Item = (&str, f64)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of distinct grids, i.e. hint slots each particle needs.
    pub fn grid_slots(&self) -> usize {
        self.slots.len()
    }

    /// Hint slot assigned to a grid.
    pub fn slot_of(&self, grid: GridId) -> Option<usize> {
        self.slots.get_index_of(&grid)
    }

    /// Sample an entry, reading and updating the particle's cell hints.
    pub fn sample(
        &self,
        handle: FieldHandle,
        t: f64,
        z: f64,
        y: f64,
        x: f64,
        hints: &mut CellHints,
    ) -> Result<Sample, SampleError> {
        let Some((name, entry)) = self.entries.get_index(handle.0) else {
            return Err(SampleError::Interpolation {
                field: Arc::from("<unbound>"),
                reason: format!("no entry at index {}", handle.0),
            });
        };
        let mut store = SlotHints::new(&self.slots, hints);
        let out = entry.sample(t, z, y, x, &mut store)?;
        debug_assert_eq!(out.len(), entry.components(), "entry '{name}'");
        Ok(out)
    }

    /// Load (and release) deferred snapshots for the time window `[t0, t1]`.
    /// Blocks until every deferred field is ready; returns the number of
    /// snapshots loaded.
    pub fn advance_window(&self, t0: f64, t1: f64) -> Result<usize, FieldError> {
        let mut loaded = 0;
        for f in &self.fields {
            loaded += f.advance_window(t0, t1)?;
        }
        Ok(loaded)
    }

    /// Whether any field loads its data lazily.
    pub fn has_deferred(&self) -> bool {
        self.fields.iter().any(|f| f.is_deferred())
    }
}

/// Builder for [`FieldSet`].
#[derive(Default)]
pub struct FieldSetBuilder {
    entries: IndexMap<String, FieldEntry>,
    constants: IndexMap<String, f64>,
}

impl FieldSetBuilder {
    /// Add a scalar field under its own name.
    pub fn add_field(&mut self, field: impl Into<Arc<Field>>) -> Result<&mut Self, FieldError> {
        let field = field.into();
        self.insert(field.name().to_string(), FieldEntry::Scalar(field))?;
        Ok(self)
    }

    /// Add a vector field under its own name. Its component fields are
    /// added under their names too, unless already present.
    pub fn add_vector_field(&mut self, vector: VectorField) -> Result<&mut Self, FieldError> {
        let name = vector.name().to_string();
        if self.entries.contains_key(&name) || self.constants.contains_key(&name) {
            return Err(FieldError::DuplicateName { name });
        }
        let mut missing = Vec::new();
        for f in vector.fields() {
            match self.entries.get(f.name()) {
                None if self.constants.contains_key(f.name()) || f.name() == name => {
                    return Err(FieldError::DuplicateName {
                        name: f.name().to_string(),
                    })
                }
                None => missing.push(f.clone()),
                Some(FieldEntry::Scalar(existing)) if Arc::ptr_eq(existing, f) => {}
                Some(_) => {
                    return Err(FieldError::DuplicateName {
                        name: f.name().to_string(),
                    })
                }
            }
        }
        for f in missing {
            self.entries.insert(f.name().to_string(), FieldEntry::Scalar(f));
        }
        self.entries.insert(name, FieldEntry::Vector(Arc::new(vector)));
        Ok(self)
    }

    /// Add `name` as the sum of existing entries.
    pub fn add_summed(&mut self, name: &str, parts: &[&str]) -> Result<&mut Self, FieldError> {
        let parts = self.resolve_parts(name, parts)?;
        self.insert(name.to_string(), FieldEntry::Summed(parts))?;
        Ok(self)
    }

    /// Add `name` as a priority list of existing entries.
    pub fn add_nested(&mut self, name: &str, parts: &[&str]) -> Result<&mut Self, FieldError> {
        let parts = self.resolve_parts(name, parts)?;
        self.insert(name.to_string(), FieldEntry::Nested(parts))?;
        Ok(self)
    }

    /// Add a named scalar constant.
    pub fn add_constant(&mut self, name: &str, value: f64) -> Result<&mut Self, FieldError> {
        if !value.is_finite() {
            return Err(FieldError::InvalidConstant { name: name.into() });
        }
        if self.entries.contains_key(name) || self.constants.contains_key(name) {
            return Err(FieldError::DuplicateName { name: name.into() });
        }
        self.constants.insert(name.to_string(), value);
        Ok(self)
    }

    /// Freeze the set and assign grid slots.
    pub fn build(&mut self) -> FieldSet {
        let entries = std::mem::take(&mut self.entries);
        let constants = std::mem::take(&mut self.constants);
        let mut fields = Vec::new();
        for e in entries.values() {
            e.collect_fields(&mut fields);
        }
        let slots = fields.iter().map(|f| f.grid().id()).collect();
        FieldSet {
            entries,
            constants,
            slots,
            fields,
        }
    }

    fn insert(&mut self, name: String, entry: FieldEntry) -> Result<(), FieldError> {
        if self.entries.contains_key(&name) || self.constants.contains_key(&name) {
            return Err(FieldError::DuplicateName { name });
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    fn resolve_parts(&self, name: &str, parts: &[&str]) -> Result<Vec<FieldEntry>, FieldError> {
        if parts.is_empty() {
            return Err(FieldError::EmptyComposite { name: name.into() });
        }
        let resolved = parts
            .iter()
            .map(|p| {
                self.entries
                    .get(*p)
                    .cloned()
                    .ok_or_else(|| FieldError::UnknownField { name: (*p).into() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let expected = resolved[0].components();
        if let Some(bad) = resolved.iter().find(|e| e.components() != expected) {
            return Err(FieldError::ComponentMismatch {
                name: name.into(),
                expected,
                got: bad.components(),
            });
        }
        Ok(resolved)
    }
}
