//! Construction and loading errors for grids, fields and field sets.
//!
//! Runtime sampling failures are [`drift_core::SampleError`]; the types
//! here are setup-time errors surfaced before any particle moves.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors detected while building a [`Grid`](crate::Grid).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GridError {
    /// An axis needs at least two points to form a cell.
    #[error("axis '{axis}' needs at least 2 points, got {len}")]
    TooShort {
        /// Which axis.
        axis: &'static str,
        /// Its length.
        len: usize,
    },
    /// Coordinates must be strictly increasing.
    #[error("axis '{axis}' is not strictly increasing at index {index}")]
    NotIncreasing {
        /// Which axis.
        axis: &'static str,
        /// First offending index.
        index: usize,
    },
    /// NaN or infinite coordinate.
    #[error("axis '{axis}' has a non-finite value at index {index}")]
    NonFinite {
        /// Which axis.
        axis: &'static str,
        /// First offending index.
        index: usize,
    },
    /// A coordinate array does not match the declared shape.
    #[error("{what}: expected {expected} values, got {got}")]
    ShapeMismatch {
        /// Which array.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
}

/// Errors from building fields and field sets, or loading snapshots.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The grid is invalid.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// The time axis is empty, unsorted or non-finite.
    #[error("field '{field}': invalid time axis: {reason}")]
    InvalidTimes {
        /// Field name.
        field: String,
        /// What is wrong.
        reason: String,
    },
    /// Number of snapshots differs from the number of times.
    #[error("field '{field}': {got} snapshots for {expected} times")]
    SnapshotCount {
        /// Field name.
        field: String,
        /// Number of times.
        expected: usize,
        /// Number of snapshots.
        got: usize,
    },
    /// A snapshot buffer has the wrong length for the grid.
    #[error("field '{field}': snapshot {index} has {got} values, grid needs {expected}")]
    SnapshotShape {
        /// Field name.
        field: String,
        /// Snapshot index.
        index: usize,
        /// Grid size.
        expected: usize,
        /// Buffer length.
        got: usize,
    },
    /// Neither in-memory snapshots nor a source were supplied.
    #[error("field '{field}': no data or snapshot source given")]
    MissingData {
        /// Field name.
        field: String,
    },
    /// Both in-memory snapshots and a snapshot source were supplied.
    #[error("field '{field}': in-memory snapshots and a snapshot source are mutually exclusive")]
    ConflictingData {
        /// Field name.
        field: String,
    },
    /// A boundary or periodicity setting is inconsistent with the grid.
    #[error("field '{field}': invalid boundary: {reason}")]
    InvalidBoundary {
        /// Field name.
        field: String,
        /// What is wrong.
        reason: String,
    },
    /// Two entries or constants share a name.
    #[error("field set already has an entry named '{name}'")]
    DuplicateName {
        /// The clashing name.
        name: String,
    },
    /// A composite references a name that is not in the set.
    #[error("field set has no entry named '{name}'")]
    UnknownField {
        /// The missing name.
        name: String,
    },
    /// Constituents of a composite disagree on component count.
    #[error("'{name}': constituents have {got} components, expected {expected}")]
    ComponentMismatch {
        /// Composite or vector name.
        name: String,
        /// Components of the first constituent.
        expected: usize,
        /// Offending count.
        got: usize,
    },
    /// A composite was declared with no constituents.
    #[error("'{name}' has no constituents")]
    EmptyComposite {
        /// Composite name.
        name: String,
    },
    /// A constant is NaN or infinite.
    #[error("constant '{name}' is not finite")]
    InvalidConstant {
        /// Constant name.
        name: String,
    },
    /// The snapshot source failed to produce a snapshot.
    #[error("field '{field}': failed to load snapshot {index}")]
    Load {
        /// Field name.
        field: String,
        /// Snapshot index.
        index: usize,
        /// Source failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}
