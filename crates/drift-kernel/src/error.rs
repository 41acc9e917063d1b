//! Translation, compilation and binding errors.
//!
//! All three are setup-time failures: they surface before any particle is
//! stepped and abort the run that requested the kernel.

use thiserror::Error;

/// A kernel source uses something the kernel language does not support,
/// or is not well-formed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// Unsupported or malformed construct.
    #[error("kernel '{kernel}', line {line}: {construct}")]
    UnsupportedConstruct {
        /// Kernel function name (or `<source>` before the name is known).
        kernel: String,
        /// 1-based source line, or 0 when the problem spans the kernel.
        line: u32,
        /// What was rejected.
        construct: String,
    },
}

impl TranslateError {
    pub(crate) fn unsupported(kernel: &str, line: u32, construct: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            kernel: kernel.to_string(),
            line,
            construct: construct.into(),
        }
    }
}

/// A backend could not produce an executable artifact.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The backend rejected the program.
    #[error("compilation of kernel {signature:016x} failed on backend '{backend}': {reason}")]
    CompilationFailure {
        /// Fingerprint of the kernel signature.
        signature: u64,
        /// Backend name.
        backend: String,
        /// Why.
        reason: String,
    },
}

/// A compiled kernel does not fit the field set it is run against.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindError {
    /// The kernel samples a field the set does not have.
    #[error("kernel samples unknown field '{name}'")]
    UnknownField {
        /// Field name.
        name: String,
    },
    /// The kernel reads a constant the set does not have.
    #[error("kernel reads unknown constant '{name}'")]
    UnknownConstant {
        /// Constant name.
        name: String,
    },
    /// The kernel destructures a field into the wrong number of components.
    #[error("field '{name}' has {actual} components but the kernel expects {expected}")]
    ComponentMismatch {
        /// Field name.
        name: String,
        /// Components the kernel uses.
        expected: usize,
        /// Components the field provides.
        actual: usize,
    },
}
