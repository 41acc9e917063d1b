//! Particle lifecycle states and kernel outcomes.

use std::fmt;

/// Runtime error categories a particle can enter.
///
/// Each kind maps to one `Error*` [`ParticleState`] and is the key under
/// which recovery kernels are registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// A field was sampled outside its spatial domain.
    OutOfBounds,
    /// A field was sampled outside its loaded time range.
    TimeExtrapolation,
    /// Interpolation could not produce a value (degenerate cell, NaN data).
    Interpolation,
    /// The kernel raised an error itself.
    Custom,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::OutOfBounds,
        ErrorKind::TimeExtrapolation,
        ErrorKind::Interpolation,
        ErrorKind::Custom,
    ];

    /// The particle state a particle enters on this error.
    pub fn state(self) -> ParticleState {
        match self {
            Self::OutOfBounds => ParticleState::ErrorOutOfBounds,
            Self::TimeExtrapolation => ParticleState::ErrorTimeExtrapolation,
            Self::Interpolation => ParticleState::ErrorInterpolation,
            Self::Custom => ParticleState::ErrorCustom,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OutOfBounds => "out-of-bounds",
            Self::TimeExtrapolation => "time-extrapolation",
            Self::Interpolation => "interpolation",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of one particle.
///
/// A particle only receives a kernel invocation while in [`Evaluate`].
/// [`Success`] particles return to `Evaluate` at the start of the next
/// timestep, `Error*` particles are routed through recovery, [`Delete`]
/// particles are removed between timesteps and [`StopExecution`] ends the
/// run.
///
/// [`Evaluate`]: ParticleState::Evaluate
/// [`Success`]: ParticleState::Success
/// [`Delete`]: ParticleState::Delete
/// [`StopExecution`]: ParticleState::StopExecution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ParticleState {
    /// Awaiting (or undergoing) kernel evaluation.
    #[default]
    Evaluate,
    /// Completed its step for the current timestep.
    Success,
    /// Sampled outside the spatial domain.
    ErrorOutOfBounds,
    /// Sampled outside the loaded time range.
    ErrorTimeExtrapolation,
    /// Interpolation failed.
    ErrorInterpolation,
    /// The kernel raised an error.
    ErrorCustom,
    /// Marked for removal at the end of the timestep.
    Delete,
    /// Requests the whole run to stop.
    StopExecution,
}

impl ParticleState {
    /// The error kind for `Error*` states.
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            Self::ErrorOutOfBounds => Some(ErrorKind::OutOfBounds),
            Self::ErrorTimeExtrapolation => Some(ErrorKind::TimeExtrapolation),
            Self::ErrorInterpolation => Some(ErrorKind::Interpolation),
            Self::ErrorCustom => Some(ErrorKind::Custom),
            _ => None,
        }
    }

    /// Whether this is one of the `Error*` states.
    pub fn is_error(self) -> bool {
        self.error_kind().is_some()
    }

    /// Integer code used in output records. Stable across releases.
    pub fn code(self) -> i32 {
        match self {
            Self::Evaluate => 0,
            Self::Success => 1,
            Self::ErrorOutOfBounds => 50,
            Self::ErrorTimeExtrapolation => 51,
            Self::ErrorInterpolation => 52,
            Self::ErrorCustom => 53,
            Self::Delete => 90,
            Self::StopExecution => 99,
        }
    }
}

impl fmt::Display for ParticleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluate => f.write_str("evaluate"),
            Self::Success => f.write_str("success"),
            Self::Delete => f.write_str("delete"),
            Self::StopExecution => f.write_str("stop-execution"),
            other => match other.error_kind() {
                Some(kind) => write!(f, "error({kind})"),
                None => Ok(()),
            },
        }
    }
}

/// What a single kernel invocation ended with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Ran to completion (or `return Success`).
    Success,
    /// A sample failed or the kernel raised an error.
    Error(ErrorKind),
    /// The kernel asked for the particle to be deleted.
    Delete,
    /// The kernel asked for the run to stop.
    StopExecution,
}

impl Outcome {
    /// The particle state this outcome moves a particle into.
    pub fn state(self) -> ParticleState {
        match self {
            Self::Success => ParticleState::Success,
            Self::Error(kind) => kind.state(),
            Self::Delete => ParticleState::Delete,
            Self::StopExecution => ParticleState::StopExecution,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.state(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_round_trip_through_states() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.state().error_kind(), Some(kind));
            assert!(kind.state().is_error());
        }
    }

    #[test]
    fn non_error_states_have_no_kind() {
        for state in [
            ParticleState::Evaluate,
            ParticleState::Success,
            ParticleState::Delete,
            ParticleState::StopExecution,
        ] {
            assert!(!state.is_error());
        }
    }

    #[test]
    fn outcome_display_matches_state() {
        assert_eq!(
            Outcome::Error(ErrorKind::OutOfBounds).to_string(),
            "error(out-of-bounds)"
        );
        assert_eq!(Outcome::Delete.to_string(), "delete");
    }
}
