//! Run-level counters returned by the stepper.
//!
//! [`RunSummary`] is filled in as the timestep loop advances and handed
//! back from [`Stepper::execute`](crate::Stepper::execute), including
//! inside [`ExecuteError::Stopped`](crate::ExecuteError::Stopped).

/// Counters and timing for one run.
///
/// Durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Outer timesteps completed.
    pub timesteps: u64,
    /// Main-kernel invocations across all particles.
    pub invocations: u64,
    /// Recovery-kernel invocations.
    pub recoveries: u64,
    /// Particles removed between timesteps.
    pub deleted: u64,
    /// Output frames appended.
    pub outputs: u64,
    /// Snapshots loaded by field window advances.
    pub snapshots_loaded: u64,
    /// Clock value when the run ended.
    pub final_time: f64,
    /// Whether a stop request ended the run early.
    pub interrupted: bool,
    /// Wall-clock time of the whole run.
    pub elapsed_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_summary_is_zero() {
        let s = RunSummary::default();
        assert_eq!(s.timesteps, 0);
        assert_eq!(s.invocations, 0);
        assert_eq!(s.recoveries, 0);
        assert_eq!(s.deleted, 0);
        assert_eq!(s.outputs, 0);
        assert_eq!(s.snapshots_loaded, 0);
        assert_eq!(s.final_time, 0.0);
        assert!(!s.interrupted);
        assert_eq!(s.elapsed_us, 0);
    }
}
