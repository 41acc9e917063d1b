//! Run configuration, validation, and error types.
//!
//! [`ExecuteConfig`] is the input to
//! [`Stepper::execute`](crate::Stepper::execute).
//! [`validate()`](ExecuteConfig::validate) checks it against the run's
//! start time and resolves the end time before any kernel is built.

use thiserror::Error;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`ExecuteConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// `dt` is zero, NaN or infinite.
    #[error("dt must be finite and non-zero, got {value}")]
    InvalidDt {
        /// The invalid value.
        value: f64,
    },
    /// Neither `runtime` nor `endtime` was given.
    #[error("one of runtime or endtime is required")]
    MissingDuration,
    /// Both `runtime` and `endtime` were given.
    #[error("runtime and endtime are mutually exclusive")]
    ConflictingDuration,
    /// `runtime` is negative, NaN or infinite.
    #[error("runtime must be finite and non-negative, got {value}")]
    InvalidRuntime {
        /// The invalid value.
        value: f64,
    },
    /// `endtime` is NaN or infinite.
    #[error("endtime must be finite, got {value}")]
    InvalidEndtime {
        /// The invalid value.
        value: f64,
    },
    /// The end time lies on the wrong side of the start for the sign of `dt`.
    #[error("endtime {end} is not reachable from {start} with dt {dt}")]
    WrongDirection {
        /// Run start time.
        start: f64,
        /// Requested end time.
        end: f64,
        /// Configured timestep.
        dt: f64,
    },
    /// `output_dt` is zero, negative, NaN or infinite.
    #[error("output_dt must be finite and positive, got {value}")]
    InvalidOutputDt {
        /// The invalid value.
        value: f64,
    },
    /// `min_dt` is not positive or exceeds `|dt|`.
    #[error("min_dt must be positive and at most |dt| = {dt}, got {value}")]
    InvalidMinDt {
        /// The invalid value.
        value: f64,
        /// `|dt|`.
        dt: f64,
    },
    /// The start time derived from the particles is NaN or infinite.
    #[error("particle start time must be finite, got {value}")]
    InvalidStart {
        /// The invalid value.
        value: f64,
    },
}

// ── ExecuteConfig ──────────────────────────────────────────────────

/// Parameters of one [`Stepper::execute`](crate::Stepper::execute) call.
#[derive(Clone, Debug)]
pub struct ExecuteConfig {
    /// Signed outer timestep. Negative runs backward in time. Default: 1.
    pub dt: f64,
    /// Run length, measured from the start time in the direction of `dt`.
    pub runtime: Option<f64>,
    /// Absolute end time. Exclusive with `runtime`.
    pub endtime: Option<f64>,
    /// Interval between output frames. `None` writes only the start frame.
    pub output_dt: Option<f64>,
    /// Smallest `|dt|` a recovery kernel may shrink a particle's step to.
    /// Default: 1e-6.
    pub min_dt: f64,
    /// Recovery attempts per particle per timestep before the run is
    /// stopped. Default: 8.
    pub max_recovery_attempts: u32,
    /// Evaluate particles on the rayon pool. Default: true.
    pub parallel: bool,
    /// Run seed for the per-particle random streams. Default: 0.
    pub seed: u64,
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            runtime: None,
            endtime: None,
            output_dt: None,
            min_dt: 1e-6,
            max_recovery_attempts: 8,
            parallel: true,
            seed: 0,
        }
    }
}

impl ExecuteConfig {
    /// Set the timestep.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Run for `runtime` time units. Clears any end time.
    pub fn with_runtime(mut self, runtime: f64) -> Self {
        self.runtime = Some(runtime);
        self.endtime = None;
        self
    }

    /// Run until `endtime`. Clears any runtime.
    pub fn with_endtime(mut self, endtime: f64) -> Self {
        self.endtime = Some(endtime);
        self.runtime = None;
        self
    }

    /// Write an output frame every `output_dt`.
    pub fn with_output_dt(mut self, output_dt: f64) -> Self {
        self.output_dt = Some(output_dt);
        self
    }

    /// Set the recovery lower bound on `|dt|`.
    pub fn with_min_dt(mut self, min_dt: f64) -> Self {
        self.min_dt = min_dt;
        self
    }

    /// Set the per-timestep recovery budget.
    pub fn with_max_recovery_attempts(mut self, attempts: u32) -> Self {
        self.max_recovery_attempts = attempts;
        self
    }

    /// Evaluate particles on the calling thread only.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the run seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// `+1.0` for forward runs, `-1.0` for backward runs.
    pub fn direction(&self) -> f64 {
        if self.dt < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    /// Check structural invariants against the run start and return the
    /// resolved end time.
    pub fn validate(&self, start: f64) -> Result<f64, ConfigError> {
        if !start.is_finite() {
            return Err(ConfigError::InvalidStart { value: start });
        }
        if !self.dt.is_finite() || self.dt == 0.0 {
            return Err(ConfigError::InvalidDt { value: self.dt });
        }
        if !self.min_dt.is_finite() || self.min_dt <= 0.0 || self.min_dt > self.dt.abs() {
            return Err(ConfigError::InvalidMinDt {
                value: self.min_dt,
                dt: self.dt.abs(),
            });
        }
        if let Some(out) = self.output_dt {
            if !out.is_finite() || out <= 0.0 {
                return Err(ConfigError::InvalidOutputDt { value: out });
            }
        }
        let end = match (self.runtime, self.endtime) {
            (None, None) => return Err(ConfigError::MissingDuration),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingDuration),
            (Some(runtime), None) => {
                if !runtime.is_finite() || runtime < 0.0 {
                    return Err(ConfigError::InvalidRuntime { value: runtime });
                }
                start + runtime * self.direction()
            }
            (None, Some(end)) => {
                if !end.is_finite() {
                    return Err(ConfigError::InvalidEndtime { value: end });
                }
                end
            }
        };
        if (end - start) * self.direction() < 0.0 {
            return Err(ConfigError::WrongDirection {
                start,
                end,
                dt: self.dt,
            });
        }
        Ok(end)
    }
}
