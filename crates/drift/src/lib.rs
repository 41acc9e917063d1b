//! Drift: Lagrangian particle tracking through gridded velocity fields.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all drift sub-crates. For most users, adding `drift` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use drift::prelude::*;
//!
//! // Uniform eastward flow on a 1-degree grid.
//! let lon: Vec<f64> = (0..=20).map(f64::from).collect();
//! let lat: Vec<f64> = (0..=10).map(f64::from).collect();
//! let grid = Arc::new(Grid::rectilinear(lon, lat).unwrap());
//! let u = Arc::new(Field::builder("U", grid.clone()).constant(1.0).build().unwrap());
//! let v = Arc::new(Field::builder("V", grid).constant(0.0).build().unwrap());
//! let mut fs = FieldSet::builder();
//! fs.add_vector_field(VectorField::builder("UV", u, v).build().unwrap())
//!     .unwrap();
//! let fieldset = fs.build();
//!
//! let kernel = Kernel::new(
//!     "fn advect(p, fs, t) {
//!         let (u, v) = fs.UV[p];
//!         p.lon += u * p.dt;
//!         p.lat += v * p.dt;
//!     }",
//! );
//!
//! let mut particles = ParticleSet::new(VariableSchema::empty());
//! particles.add(2.0, 5.0, 0.0, 0.0).unwrap();
//!
//! let cache = KernelCache::default();
//! let config = ExecuteConfig::default().with_runtime(5.0);
//! let summary = Stepper::new(&cache)
//!     .execute(&mut particles, &fieldset, &kernel, &config, None)
//!     .unwrap();
//! assert_eq!(summary.timesteps, 5);
//! assert_eq!(particles.lon(), &[7.0]);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `drift-core` | IDs, particle states, error kinds, variable schema, particle record |
//! | [`field`] | `drift-field` | Grids, fields, interpolation, vector fields, field sets |
//! | [`kernel`] | `drift-kernel` | Kernel language, IR, backends and the artifact cache |
//! | [`engine`] | `drift-engine` | Particle sets, the stepper, recovery and output |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and IDs (`drift-core`).
///
/// Contains [`types::ParticleRecord`], [`types::ParticleState`],
/// [`types::ErrorKind`] and the [`types::VariableSchema`] a particle set
/// is built with.
pub use drift_core as types;

/// Field interpolation (`drift-field`).
///
/// Build [`field::Grid`]s and [`field::Field`]s, combine them into
/// [`field::VectorField`]s and gather everything in a [`field::FieldSet`].
pub use drift_field as field;

/// Kernel translation, compilation and caching (`drift-kernel`).
///
/// [`kernel::Kernel`] holds source, [`kernel::KernelCache`] builds and
/// shares artifacts through a [`kernel::KernelBackend`].
pub use drift_kernel as kernel;

/// Particle stepping (`drift-engine`).
///
/// [`engine::Stepper`] runs a kernel over a [`engine::ParticleSet`].
pub use drift_engine as engine;

/// Common imports for typical drift usage.
///
/// ```rust
/// use drift::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use drift_core::{
        ErrorKind, Outcome, ParticleId, ParticleRecord, ParticleState, VarType, Variable,
        VariableSchema,
    };

    // Fields
    pub use drift_field::{
        AxisBoundary, Field, FieldSet, Grid, Interp, SnapshotSource, Staggering, VectorField,
    };

    // Kernels
    pub use drift_kernel::{Kernel, KernelBackend, KernelCache, PrintSink, TracingPrint};

    // Engine
    pub use drift_engine::{
        ExecuteConfig, MemoryOutput, OutputSink, ParticleSet, RecoveryMap, RunSummary, StopHandle,
        Stepper,
    };

    // Errors
    pub use drift_core::SampleError;
    pub use drift_engine::{ConfigError, ExecuteError};
    pub use drift_field::FieldError;
    pub use drift_kernel::{BindError, CompileError, TranslateError};
}
