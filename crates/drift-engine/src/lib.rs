//! Particle stepper for the drift engine.
//!
//! Drives a [`ParticleSet`] through time: once per outer timestep every
//! particle behind the target gets the compiled kernel invoked on a
//! working copy of its record, outcomes move it through the
//! [`ParticleState`](drift_core::ParticleState) machine, and errors are
//! routed through the [`RecoveryMap`].
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | [`ExecuteConfig`] and its validation |
//! | [`particleset`] | columnar particle storage |
//! | [`stepper`] | the timestep loop |
//! | [`recovery`] | error-kind to recovery-kernel registry |
//! | [`output`] | [`OutputSink`] boundary and [`MemoryOutput`] |
//! | [`stop`] | cooperative cancellation |
//! | [`metrics`] | [`RunSummary`] counters |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod output;
pub mod particleset;
pub mod recovery;
pub mod stepper;
pub mod stop;

pub use config::{ConfigError, ExecuteConfig};
pub use error::ExecuteError;
pub use metrics::RunSummary;
pub use output::{MemoryOutput, OutputError, OutputFrame, OutputRecord, OutputSink};
pub use particleset::{ParticleSet, ParticleSetError};
pub use recovery::RecoveryMap;
pub use stepper::Stepper;
pub use stop::StopHandle;
