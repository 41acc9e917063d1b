//! Run-level error type.

use drift_core::{ErrorKind, ParticleId};
use drift_field::FieldError;
use drift_kernel::{BindError, CompileError, TranslateError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::metrics::RunSummary;
use crate::output::OutputError;

/// Everything [`Stepper::execute`](crate::Stepper::execute) can fail with.
///
/// All variants except [`Stopped`](Self::Stopped) and
/// [`Output`](Self::Output) are raised before the first timestep, with the
/// particle set untouched.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The run configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The main or a recovery kernel failed to translate.
    #[error(transparent)]
    Translate(#[from] TranslateError),
    /// The backend failed to build an artifact.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// A kernel names a field or constant the field set lacks.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// A field window could not be advanced.
    #[error(transparent)]
    Field(#[from] FieldError),
    /// The output sink failed.
    #[error(transparent)]
    Output(#[from] OutputError),
    /// A particle escalated to `StopExecution`. Output was flushed before
    /// this is returned.
    #[error("run stopped at time {time}: particle {particle} {}", describe(.cause))]
    Stopped {
        /// Clock value at the end of the failing timestep.
        time: f64,
        /// First particle (by id) that stopped the run.
        particle: ParticleId,
        /// Runtime error that was left unrecovered, if any.
        cause: Option<ErrorKind>,
        /// Counters up to the stop.
        summary: Box<RunSummary>,
    },
}

fn describe(cause: &Option<ErrorKind>) -> String {
    match cause {
        Some(kind) => format!("hit an unrecovered {kind} error"),
        None => "requested StopExecution".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_message_names_the_cause() {
        let err = ExecuteError::Stopped {
            time: 2.0,
            particle: ParticleId(4),
            cause: Some(ErrorKind::OutOfBounds),
            summary: Box::default(),
        };
        assert_eq!(
            err.to_string(),
            "run stopped at time 2: particle 4 hit an unrecovered out-of-bounds error"
        );
        let err = ExecuteError::Stopped {
            time: 1.5,
            particle: ParticleId(0),
            cause: None,
            summary: Box::default(),
        };
        assert!(err.to_string().ends_with("requested StopExecution"));
    }

    #[test]
    fn config_errors_convert() {
        let err: ExecuteError = ConfigError::MissingDuration.into();
        assert!(matches!(err, ExecuteError::Config(ConfigError::MissingDuration)));
    }
}
