//! Core types for the drift particle-tracking engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the field interpolator, the kernel compiler and the
//! particle stepper: identifiers, particle states and error kinds, sampling
//! errors, the per-run variable schema and the particle record handed to
//! kernels.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod id;
pub mod particle;
pub mod schema;
pub mod status;

pub use error::SampleError;
pub use id::{GridId, ParticleId, ParticleIdAllocator};
pub use particle::{CellHint, CellHints, ParticleRecord};
pub use schema::{Builtin, SchemaError, VarType, Variable, VariableSchema, VariableSchemaBuilder};
pub use status::{ErrorKind, Outcome, ParticleState};
