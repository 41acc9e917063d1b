//! Backends turning a linked program into an executable artifact.

use std::fmt;
use std::sync::Arc;

use drift_core::Outcome;

use crate::error::CompileError;
use crate::ir::{Instr, Program};
use crate::kernel::KernelSignature;
use crate::vm::{execute, Invocation};

/// An executable kernel. Immutable and shared across worker threads.
pub trait CompiledKernel: Send + Sync + fmt::Debug {
    /// The program this artifact executes.
    fn program(&self) -> &Arc<Program>;

    /// Run the kernel once for one particle.
    fn invoke(&self, inv: &mut Invocation<'_>) -> Outcome;
}

/// Produces [`CompiledKernel`]s.
pub trait KernelBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Build an artifact for `program`.
    fn build(
        &self,
        program: &Arc<Program>,
        signature: &KernelSignature,
    ) -> Result<Arc<dyn CompiledKernel>, CompileError>;
}

/// Executes programs on the built-in stack machine after verifying them.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterpreterBackend;

impl KernelBackend for InterpreterBackend {
    fn name(&self) -> &str {
        "interpreter"
    }

    fn build(
        &self,
        program: &Arc<Program>,
        signature: &KernelSignature,
    ) -> Result<Arc<dyn CompiledKernel>, CompileError> {
        let max_stack = verify(program).map_err(|reason| CompileError::CompilationFailure {
            signature: signature.fingerprint(),
            backend: self.name().to_string(),
            reason,
        })?;
        Ok(Arc::new(Interpreted {
            program: Arc::clone(program),
            max_stack,
        }))
    }
}

#[derive(Debug)]
struct Interpreted {
    program: Arc<Program>,
    max_stack: usize,
}

impl CompiledKernel for Interpreted {
    fn program(&self) -> &Arc<Program> {
        &self.program
    }

    fn invoke(&self, inv: &mut Invocation<'_>) -> Outcome {
        inv.scratch.reserve(self.max_stack);
        execute(&self.program, inv)
    }
}

/// Check jump targets, table indices and stack discipline. Returns the
/// maximum stack depth.
///
/// Every instruction must be reached with one stack height regardless of
/// path, and the program must end with an empty stack.
pub fn verify(program: &Program) -> Result<usize, String> {
    let len = program.code.len();
    let mut heights: Vec<Option<usize>> = vec![None; len + 1];
    let mut work = vec![(0usize, 0usize)];
    let mut max = 0;

    let index = |what: &str, i: u16, n: usize, pc: usize| {
        if usize::from(i) < n {
            Ok(())
        } else {
            Err(format!("{pc:04}: {what} index {i} out of range ({n})"))
        }
    };

    while let Some((pc, h)) = work.pop() {
        match heights[pc] {
            Some(seen) if seen == h => continue,
            Some(seen) => {
                return Err(format!(
                    "{pc:04}: stack height {h} disagrees with {seen} on another path"
                ))
            }
            None => heights[pc] = Some(h),
        }
        let Some(instr) = program.code.get(pc) else {
            if h != 0 {
                return Err(format!("program ends with {h} values on the stack"));
            }
            continue;
        };

        let (pops, pushes) = match *instr {
            Instr::Const(_) | Instr::LoadAttr(_) | Instr::LoadVar(_) | Instr::LoadTime => (0, 1),
            Instr::LoadLocal(i) => {
                index("local", i, program.locals.len(), pc)?;
                (0, 1)
            }
            Instr::StoreLocal(i) => {
                index("local", i, program.locals.len(), pc)?;
                (1, 0)
            }
            Instr::LoadConst(i) => {
                index("constant", i, program.constants.len(), pc)?;
                (0, 1)
            }
            Instr::StoreAttr(b) => {
                if !b.is_writable() {
                    return Err(format!("{pc:04}: store to read-only attribute {}", b.name()));
                }
                (1, 0)
            }
            Instr::StoreVar(..) => (1, 0),
            Instr::Binary(_) => (2, 1),
            Instr::Neg | Instr::Not => (1, 1),
            Instr::Jump(_) => (0, 0),
            Instr::JumpIfFalse(_) | Instr::JumpIfTrue(_) => (1, 0),
            Instr::Sample { field, particle } => {
                index("field", field, program.fields.len(), pc)?;
                let n = usize::from(program.fields[usize::from(field)].components);
                if !(1..=3).contains(&n) {
                    return Err(format!("{pc:04}: field sampled into {n} components"));
                }
                (if particle { 0 } else { 4 }, n)
            }
            Instr::Math(f) => (f.arity(), 1),
            Instr::Random(f) => (f.arity(), 1),
            Instr::Print(i) => {
                index("format", i, program.formats.len(), pc)?;
                (program.formats[usize::from(i)].arity(), 0)
            }
            Instr::Exit(_) => (0, 0),
        };
        if h < pops {
            return Err(format!("{pc:04}: stack underflow"));
        }
        let next_h = h - pops + pushes;
        max = max.max(next_h);

        let target = match *instr {
            Instr::Jump(t) | Instr::JumpIfFalse(t) | Instr::JumpIfTrue(t) => {
                let t = t as usize;
                if t > len {
                    return Err(format!("{pc:04}: jump target {t:04} out of range"));
                }
                Some(t)
            }
            _ => None,
        };
        match *instr {
            Instr::Exit(_) => {}
            Instr::Jump(_) => work.extend(target.map(|t| (t, next_h))),
            _ => {
                work.push((pc + 1, next_h));
                work.extend(target.map(|t| (t, next_h)));
            }
        }
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use drift_core::VariableSchema;

    fn program(code: Vec<Instr>) -> Program {
        Program {
            code,
            fields: Vec::new(),
            constants: Vec::new(),
            locals: vec!["x".into()],
            formats: Vec::new(),
            segments: vec!["k".into()],
        }
    }

    #[test]
    fn translated_programs_verify() {
        let k = Kernel::new(
            "fn k(p, fs, t) {
                let i = 0;
                while i < 10 && not (p.lon > 3 || p.lat > 3) {
                    i += 1;
                    if i == 5 { break; }
                }
                let (u, v) = fs.UV[t, p.depth, p.lat, p.lon];
                p.lon += math.max(u, v) * random.uniform(0, 1);
            }",
        )
        .translate(&VariableSchema::empty())
        .unwrap();
        let max = verify(&k.program).unwrap();
        assert!(max >= 4);
    }

    #[test]
    fn rejects_underflow() {
        let err = verify(&program(vec![Instr::Binary(crate::ast::BinOp::Add)])).unwrap_err();
        assert!(err.contains("underflow"), "{err}");
    }

    #[test]
    fn rejects_leftover_values() {
        let err = verify(&program(vec![Instr::Const(1.0)])).unwrap_err();
        assert!(err.contains("ends with 1"), "{err}");
    }

    #[test]
    fn rejects_bad_targets_and_indices() {
        assert!(verify(&program(vec![Instr::Jump(7)])).is_err());
        assert!(verify(&program(vec![Instr::LoadConst(0), Instr::StoreLocal(0)])).is_err());
        assert!(verify(&program(vec![Instr::Const(1.0), Instr::StoreLocal(3)])).is_err());
    }

    #[test]
    fn rejects_inconsistent_merge() {
        // One path pushes before reaching the end, the other does not.
        let code = vec![
            Instr::Const(1.0),
            Instr::JumpIfFalse(3),
            Instr::Const(2.0),
            Instr::Const(0.0),
            Instr::StoreLocal(0),
        ];
        assert!(verify(&program(code)).is_err());
    }

    #[test]
    fn exit_may_leave_values() {
        let code = vec![Instr::Const(1.0), Instr::Exit(crate::ir::Exit::Delete)];
        assert_eq!(verify(&program(code)).unwrap(), 1);
    }
}
