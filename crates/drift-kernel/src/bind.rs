//! Binding a compiled kernel to a field set.

use std::sync::Arc;

use drift_core::{Outcome, ParticleRecord};
use drift_field::{FieldHandle, FieldSet};

use crate::backend::CompiledKernel;
use crate::error::BindError;
use crate::print::PrintSink;
use crate::vm::{Invocation, Scratch};

/// A compiled kernel with its field and constant tables resolved against
/// one field set.
#[derive(Clone, Debug)]
pub struct BoundKernel<'fs> {
    kernel: Arc<dyn CompiledKernel>,
    fieldset: &'fs FieldSet,
    fields: Vec<FieldHandle>,
    constants: Vec<f64>,
}

impl<'fs> BoundKernel<'fs> {
    /// Resolve every field and constant the kernel uses.
    pub fn bind(kernel: Arc<dyn CompiledKernel>, fieldset: &'fs FieldSet) -> Result<Self, BindError> {
        let program = Arc::clone(kernel.program());
        let fields = program
            .fields
            .iter()
            .map(|f| {
                let handle = fieldset
                    .handle(&f.name)
                    .ok_or_else(|| BindError::UnknownField { name: f.name.clone() })?;
                let actual = fieldset.components(handle);
                if actual != usize::from(f.components) {
                    return Err(BindError::ComponentMismatch {
                        name: f.name.clone(),
                        expected: usize::from(f.components),
                        actual,
                    });
                }
                Ok(handle)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let constants = program
            .constants
            .iter()
            .map(|name| {
                fieldset
                    .constant(name)
                    .ok_or_else(|| BindError::UnknownConstant { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            kernel,
            fieldset,
            fields,
            constants,
        })
    }

    /// The underlying artifact.
    pub fn kernel(&self) -> &Arc<dyn CompiledKernel> {
        &self.kernel
    }

    /// The field set this kernel is bound to.
    pub fn fieldset(&self) -> &'fs FieldSet {
        self.fieldset
    }

    /// Invoke once on a working copy of a particle at its own time.
    pub fn run(
        &self,
        particle: &mut ParticleRecord,
        seed: u64,
        print: &dyn PrintSink,
        scratch: &mut Scratch,
    ) -> Outcome {
        let time = particle.time;
        let mut inv = Invocation {
            particle,
            time,
            fieldset: self.fieldset,
            fields: &self.fields,
            constants: &self.constants,
            seed,
            print,
            scratch,
        };
        self.kernel.invoke(&mut inv)
    }
}
