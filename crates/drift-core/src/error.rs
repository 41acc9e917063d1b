//! Sampling errors raised by field lookups.

use std::sync::Arc;

use thiserror::Error;

use crate::status::ErrorKind;

/// A field lookup that could not produce a value.
///
/// Raised per particle and never fatal by itself: the stepper turns it into
/// the matching `Error*` particle state and routes it through recovery.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SampleError {
    /// The position lies outside the field's spatial domain.
    #[error("field '{field}': position (lon {lon}, lat {lat}, depth {depth}) is out of bounds")]
    OutOfBounds {
        /// Name of the sampled field.
        field: Arc<str>,
        /// Queried longitude (or x).
        lon: f64,
        /// Queried latitude (or y).
        lat: f64,
        /// Queried depth.
        depth: f64,
    },
    /// The time lies outside the field's loaded time range.
    #[error("field '{field}': time {time} is outside the loaded range [{start}, {end}]")]
    TimeExtrapolation {
        /// Name of the sampled field.
        field: Arc<str>,
        /// Queried time.
        time: f64,
        /// First available time.
        start: f64,
        /// Last available time.
        end: f64,
    },
    /// The cell was found but no value could be computed.
    #[error("field '{field}': interpolation failed: {reason}")]
    Interpolation {
        /// Name of the sampled field.
        field: Arc<str>,
        /// What went wrong.
        reason: String,
    },
}

impl SampleError {
    /// The error category this maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Self::TimeExtrapolation { .. } => ErrorKind::TimeExtrapolation,
            Self::Interpolation { .. } => ErrorKind::Interpolation,
        }
    }

    /// Name of the field that raised the error.
    pub fn field(&self) -> &str {
        match self {
            Self::OutOfBounds { field, .. }
            | Self::TimeExtrapolation { field, .. }
            | Self::Interpolation { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_messages() {
        let e = SampleError::OutOfBounds {
            field: Arc::from("U"),
            lon: 10.5,
            lat: 0.0,
            depth: 0.0,
        };
        assert_eq!(e.kind(), ErrorKind::OutOfBounds);
        assert_eq!(e.field(), "U");
        assert!(e.to_string().contains("out of bounds"));

        let e = SampleError::TimeExtrapolation {
            field: Arc::from("V"),
            time: 5.0,
            start: 0.0,
            end: 1.0,
        };
        assert_eq!(e.kind(), ErrorKind::TimeExtrapolation);
    }
}
