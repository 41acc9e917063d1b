//! Spatiotemporal field interpolation for the drift engine.
//!
//! A [`Field`] is a scalar over (time, depth, lat, lon) defined on a
//! [`Grid`]. Lookups locate the grid cell containing the query point
//! (starting from the particle's cached cell), interpolate each bracketing
//! time snapshot spatially and blend the two linearly in time. Points
//! outside the domain wrap, clamp or fail with a [`SampleError`] according
//! to the field's [`AxisBoundary`] settings.
//!
//! [`VectorField`]s combine component fields (node-centred or
//! face-staggered), and a [`FieldSet`] gathers named entries, composites
//! and constants into the read-only view kernels sample from.
//!
//! [`SampleError`]: drift_core::SampleError

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod fieldset;
pub mod grid;
pub mod hints;
pub mod interp;
pub mod search;
pub mod vector;

pub use error::{FieldError, GridError};
pub use field::{Field, FieldBuilder, LoadError, SnapshotSource};
pub use fieldset::{FieldEntry, FieldHandle, FieldSet, FieldSetBuilder, Sample};
pub use grid::{Grid, Horizontal, Mesh, Vertical};
pub use hints::{HintStore, NoHints, SlotHints};
pub use interp::Interp;
pub use search::{AxisBoundary, Boundaries, CellPos};
pub use vector::{Staggering, VectorField, VectorFieldBuilder};
