//! Stack machine executing a linked [`Program`] for one particle.

use drift_core::{ErrorKind, Outcome, ParticleRecord};
use drift_field::{FieldHandle, FieldSet};
use tracing::{trace, warn};

use crate::ir::{Exit, Instr, Program};
use crate::print::PrintSink;
use crate::rng::KernelRng;

/// Backward jumps one invocation may take before it is aborted with a
/// custom error.
pub const MAX_BACK_EDGES: u64 = 1 << 24;

/// Reusable per-worker buffers. Contents never survive an invocation.
#[derive(Debug, Default)]
pub struct Scratch {
    stack: Vec<f64>,
    locals: Vec<f64>,
    rng: Option<KernelRng>,
}

impl Scratch {
    /// Empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reserve(&mut self, depth: usize) {
        self.stack.reserve(depth.saturating_sub(self.stack.len()));
    }
}

/// Everything one kernel invocation reads and writes.
pub struct Invocation<'a> {
    /// Working copy of the particle record.
    pub particle: &'a mut ParticleRecord,
    /// Invocation time.
    pub time: f64,
    /// Field set the program's field table was bound against.
    pub fieldset: &'a FieldSet,
    /// Bound handle per field-table entry.
    pub fields: &'a [FieldHandle],
    /// Bound value per constant-table entry.
    pub constants: &'a [f64],
    /// Run seed for random streams.
    pub seed: u64,
    /// Destination of `print` statements.
    pub print: &'a dyn PrintSink,
    /// Buffers.
    pub scratch: &'a mut Scratch,
}

#[inline]
fn pop(stack: &mut Vec<f64>) -> f64 {
    stack.pop().unwrap_or(f64::NAN)
}

#[inline]
fn truthy(v: f64) -> bool {
    v != 0.0
}

/// Run `program` to completion or to its first non-success exit.
pub(crate) fn execute(program: &Program, inv: &mut Invocation<'_>) -> Outcome {
    let Scratch { stack, locals, rng } = &mut *inv.scratch;
    let p = &mut *inv.particle;
    stack.clear();
    locals.clear();
    locals.resize(program.locals.len(), 0.0);
    *rng = None;
    let start_time = p.time;

    let mut pc = 0usize;
    let mut back_edges = 0u64;
    while let Some(instr) = program.code.get(pc) {
        pc += 1;
        match *instr {
            Instr::Const(x) => stack.push(x),
            Instr::LoadAttr(b) => stack.push(p.builtin(b)),
            Instr::StoreAttr(b) => {
                let v = pop(stack);
                p.set_builtin(b, v);
            }
            Instr::LoadVar(i) => match p.vars.get(usize::from(i)) {
                Some(v) => stack.push(*v),
                None => return Outcome::Error(ErrorKind::Custom),
            },
            Instr::StoreVar(i, ty) => {
                let v = pop(stack);
                match p.vars.get_mut(usize::from(i)) {
                    Some(slot) => *slot = ty.coerce(v),
                    None => return Outcome::Error(ErrorKind::Custom),
                }
            }
            Instr::LoadLocal(i) => stack.push(locals[usize::from(i)]),
            Instr::StoreLocal(i) => locals[usize::from(i)] = pop(stack),
            Instr::LoadTime => stack.push(inv.time),
            Instr::LoadConst(i) => {
                stack.push(inv.constants.get(usize::from(i)).copied().unwrap_or(f64::NAN))
            }
            Instr::Binary(op) => {
                let b = pop(stack);
                let a = pop(stack);
                stack.push(op.apply(a, b));
            }
            Instr::Neg => {
                let v = pop(stack);
                stack.push(-v);
            }
            Instr::Not => {
                let v = pop(stack);
                stack.push(f64::from(u8::from(!truthy(v))));
            }
            Instr::Jump(t) => {
                let t = t as usize;
                if t < pc {
                    back_edges += 1;
                    if back_edges > MAX_BACK_EDGES {
                        warn!(
                            particle = %p.id,
                            segments = ?program.segments,
                            "kernel loop exceeded {MAX_BACK_EDGES} iterations"
                        );
                        return Outcome::Error(ErrorKind::Custom);
                    }
                }
                pc = t;
            }
            Instr::JumpIfFalse(t) => {
                if !truthy(pop(stack)) {
                    pc = t as usize;
                }
            }
            Instr::JumpIfTrue(t) => {
                if truthy(pop(stack)) {
                    pc = t as usize;
                }
            }
            Instr::Sample { field, particle } => {
                let (t, z, y, x) = if particle {
                    (p.time, p.depth, p.lat, p.lon)
                } else {
                    let x = pop(stack);
                    let y = pop(stack);
                    let z = pop(stack);
                    (pop(stack), z, y, x)
                };
                let Some(&handle) = inv.fields.get(usize::from(field)) else {
                    return Outcome::Error(ErrorKind::Interpolation);
                };
                match inv.fieldset.sample(handle, t, z, y, x, &mut p.hints) {
                    Ok(values) => stack.extend(values),
                    Err(e) => {
                        trace!(particle = %p.id, error = %e, "sample failed");
                        return Outcome::Error(e.kind());
                    }
                }
            }
            Instr::Math(f) => {
                let at = stack.len().saturating_sub(f.arity());
                let v = f.eval(&stack[at..]);
                stack.truncate(at);
                stack.push(v);
            }
            Instr::Random(f) => {
                let stream = rng.get_or_insert_with(|| KernelRng::new(inv.seed, p.id, start_time));
                let at = stack.len().saturating_sub(f.arity());
                let v = f.eval(stream.inner(), &stack[at..]);
                stack.truncate(at);
                stack.push(v);
            }
            Instr::Print(i) => {
                let Some(format) = program.formats.get(usize::from(i)) else {
                    return Outcome::Error(ErrorKind::Custom);
                };
                let at = stack.len().saturating_sub(format.arity());
                let line = format.render(&stack[at..]);
                stack.truncate(at);
                inv.print.print(p.id, &line);
            }
            Instr::Exit(Exit::Delete) => return Outcome::Delete,
            Instr::Exit(Exit::Error) => return Outcome::Error(ErrorKind::Custom),
            Instr::Exit(Exit::Stop) => return Outcome::StopExecution,
        }
    }
    debug_assert!(stack.is_empty(), "unbalanced stack at exit");
    Outcome::Success
}
