//! Test fixtures and mock types for drift development.
//!
//! Provides ready-made field sets ([`uniform_flow`], [`ramp_fieldset`]),
//! reference kernels ([`kernels`]) and instrumented implementations of the
//! ingestion and backend seams ([`CountingSource`], [`CountingBackend`]).

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod kernels;
pub mod mocks;

pub use drift_kernel::CapturedPrint;
pub use fixtures::{
    axis, flat_grid, ramp_field, ramp_fieldset, ramp_value, uniform_flow, uniform_flow_on,
};
pub use mocks::{CountingBackend, CountingSource};
