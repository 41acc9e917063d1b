//! Fixed-instruction IR.
//!
//! Each kernel function lowers to a [`Segment`] with segment-local tables.
//! [`link`] concatenates segments in composition order into one
//! [`Program`], unifying locals, fields and constants by name. Jump targets
//! are absolute instruction indices; a target equal to the code length
//! means "end of program".

use drift_core::{Builtin, VarType};
use indexmap::{IndexMap, IndexSet};

use crate::ast::BinOp;
use crate::builtins::{MathFn, RandomFn};
use crate::error::TranslateError;
use crate::format::PrintFormat;

/// Early exits other than success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Exit {
    /// `return Delete;` or `particle.delete();`
    Delete,
    /// `return Error;`: a custom error.
    Error,
    /// `return StopExecution;`
    Stop,
}

impl Exit {
    /// Mnemonic used in listings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Error => "error",
            Self::Stop => "stop",
        }
    }
}

/// One IR instruction. Stack effects are noted per variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Instr {
    /// Push a literal. `+1`
    Const(f64),
    /// Push a built-in particle attribute. `+1`
    LoadAttr(Builtin),
    /// Pop into a writable built-in attribute. `-1`
    StoreAttr(Builtin),
    /// Push a user variable by schema slot. `+1`
    LoadVar(u16),
    /// Pop, coerce to the type, store into a user variable. `-1`
    StoreVar(u16, VarType),
    /// Push a local. `+1`
    LoadLocal(u16),
    /// Pop into a local. `-1`
    StoreLocal(u16),
    /// Push the invocation time. `+1`
    LoadTime,
    /// Push a field-set constant by constant-table index. `+1`
    LoadConst(u16),
    /// Pop two, push the result. `-1`
    Binary(BinOp),
    /// Negate the top. `0`
    Neg,
    /// Logical not of the top (1.0 / 0.0). `0`
    Not,
    /// Unconditional jump. `0`
    Jump(u32),
    /// Pop; jump when zero. `-1`
    JumpIfFalse(u32),
    /// Pop; jump when non-zero. `-1`
    JumpIfTrue(u32),
    /// Sample a field-table entry and push its components. With
    /// `particle` set the position comes from the record (`+n`);
    /// otherwise `t, z, y, x` are popped first (`n - 4`). A failed
    /// sample ends the invocation with that error kind.
    Sample {
        /// Field-table index.
        field: u16,
        /// Whether to sample at the particle's own position.
        particle: bool,
    },
    /// Pop the arguments, push the result. `1 - arity`
    Math(MathFn),
    /// Pop the arguments, push a draw from the particle's RNG. `1 - arity`
    Random(RandomFn),
    /// Pop the format's arguments and emit a line. `-arity`
    Print(u16),
    /// End the invocation with a non-success outcome.
    Exit(Exit),
}

/// A field sampled by a program, with the number of components it is
/// destructured into.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Field-set entry name.
    pub name: String,
    /// Components pushed per sample.
    pub components: u8,
}

/// A linked, executable program.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    /// Instructions.
    pub code: Vec<Instr>,
    /// Field table.
    pub fields: Vec<FieldRef>,
    /// Constant table.
    pub constants: Vec<String>,
    /// Local table.
    pub locals: Vec<String>,
    /// Print formats.
    pub formats: Vec<PrintFormat>,
    /// Kernel function names in composition order.
    pub segments: Vec<String>,
}

impl Program {
    /// Whether the program draws random numbers.
    pub fn uses_random(&self) -> bool {
        self.code.iter().any(|i| matches!(i, Instr::Random(_)))
    }
}

/// Narrows a table index to an instruction operand, rejecting kernels whose
/// `table` outgrows the operand width.
pub(crate) fn slot(index: usize, kernel: &str, line: u32, table: &str) -> Result<u16, TranslateError> {
    u16::try_from(index).map_err(|_| {
        TranslateError::unsupported(
            kernel,
            line,
            format!("more than {} {table}", usize::from(u16::MAX) + 1),
        )
    })
}

/// One translated kernel function, before linking.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Kernel function name.
    pub name: String,
    /// Instructions; jump targets are segment-relative.
    pub code: Vec<Instr>,
    /// Segment field table.
    pub fields: Vec<FieldRef>,
    /// Segment constant table.
    pub constants: Vec<String>,
    /// Segment local table.
    pub locals: Vec<String>,
    /// Segment print formats.
    pub formats: Vec<PrintFormat>,
    /// Locals this segment assigns.
    pub assigned: IndexSet<String>,
    /// Locals read but not assigned here, with the line of the first read.
    pub free_reads: Vec<(String, u32)>,
    /// Line of the first sample of each field, for link diagnostics.
    pub field_lines: Vec<u32>,
}

/// Link segments in order into one program.
///
/// A local read by a segment must be assigned by that segment or an
/// earlier one. A field must be destructured into the same number of
/// components everywhere.
pub fn link(segments: &[Segment]) -> Result<Program, TranslateError> {
    let mut code = Vec::new();
    let mut fields: IndexMap<String, u8> = IndexMap::new();
    let mut constants: IndexSet<String> = IndexSet::new();
    let mut locals: IndexSet<String> = IndexSet::new();
    let mut formats = Vec::new();
    let mut assigned: IndexSet<&str> = IndexSet::new();

    for seg in segments {
        assigned.extend(seg.assigned.iter().map(String::as_str));
        if let Some((name, line)) = seg
            .free_reads
            .iter()
            .find(|(name, _)| !assigned.contains(name.as_str()))
        {
            return Err(TranslateError::unsupported(
                &seg.name,
                *line,
                format!("unknown local '{name}'"),
            ));
        }

        let field_map = seg
            .fields
            .iter()
            .zip(&seg.field_lines)
            .map(|(f, line)| match fields.get(&f.name).copied() {
                Some(n) if n != f.components => Err(TranslateError::unsupported(
                    &seg.name,
                    *line,
                    format!(
                        "field '{}' is used with both {} and {} components",
                        f.name, n, f.components
                    ),
                )),
                _ => slot(
                    fields.insert_full(f.name.clone(), f.components).0,
                    &seg.name,
                    *line,
                    "fields",
                ),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let const_map = seg
            .constants
            .iter()
            .map(|c| slot(constants.insert_full(c.clone()).0, &seg.name, 0, "constants"))
            .collect::<Result<Vec<_>, _>>()?;
        let local_map = seg
            .locals
            .iter()
            .map(|l| slot(locals.insert_full(l.clone()).0, &seg.name, 0, "locals"))
            .collect::<Result<Vec<_>, _>>()?;
        let format_map = (formats.len()..formats.len() + seg.formats.len())
            .map(|i| slot(i, &seg.name, 0, "print formats"))
            .collect::<Result<Vec<_>, _>>()?;
        formats.extend(seg.formats.iter().cloned());

        let base = code.len() as u32;
        code.extend(seg.code.iter().map(|instr| match *instr {
            Instr::LoadLocal(i) => Instr::LoadLocal(local_map[usize::from(i)]),
            Instr::StoreLocal(i) => Instr::StoreLocal(local_map[usize::from(i)]),
            Instr::LoadConst(i) => Instr::LoadConst(const_map[usize::from(i)]),
            Instr::Sample { field, particle } => Instr::Sample {
                field: field_map[usize::from(field)],
                particle,
            },
            Instr::Print(i) => Instr::Print(format_map[usize::from(i)]),
            Instr::Jump(t) => Instr::Jump(base + t),
            Instr::JumpIfFalse(t) => Instr::JumpIfFalse(base + t),
            Instr::JumpIfTrue(t) => Instr::JumpIfTrue(base + t),
            other => other,
        }));
    }

    Ok(Program {
        code,
        fields: fields
            .into_iter()
            .map(|(name, components)| FieldRef { name, components })
            .collect(),
        constants: constants.into_iter().collect(),
        locals: locals.into_iter().collect(),
        formats,
        segments: segments.iter().map(|s| s.name.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(name: &str, locals: Vec<String>) -> Segment {
        Segment {
            name: name.to_string(),
            code: vec![Instr::LoadLocal(0), Instr::StoreLocal(0)],
            fields: Vec::new(),
            constants: Vec::new(),
            assigned: locals.iter().cloned().collect(),
            locals,
            formats: Vec::new(),
            free_reads: Vec::new(),
            field_lines: Vec::new(),
        }
    }

    #[test]
    fn slot_accepts_the_full_operand_range() {
        assert_eq!(slot(0, "k", 1, "locals"), Ok(0));
        assert_eq!(slot(65_535, "k", 1, "locals"), Ok(u16::MAX));
        let err = slot(65_536, "k", 7, "locals").unwrap_err();
        assert_eq!(
            err,
            TranslateError::unsupported("k", 7, "more than 65536 locals")
        );
    }

    #[test]
    fn link_rejects_programs_with_too_many_locals() {
        let half = |tag: &str| (0..40_000).map(|i| format!("{tag}{i}")).collect::<Vec<_>>();
        let a = segment("a", half("a"));
        let b = segment("b", half("b"));
        let err = link(&[a.clone(), b]).unwrap_err();
        let TranslateError::UnsupportedConstruct { kernel, construct, .. } = err;
        assert_eq!(kernel, "b");
        assert!(construct.contains("locals"), "{construct}");

        let ok = link(&[a.clone(), a]).unwrap();
        assert_eq!(ok.locals.len(), 40_000);
    }

    #[test]
    fn link_remaps_print_formats_after_earlier_segments() {
        let fmt = crate::format::PrintFormat::parse("x").unwrap();
        let mut a = segment("a", vec!["x".into()]);
        a.formats = vec![fmt.clone(), fmt.clone()];
        let mut b = segment("b", vec!["x".into()]);
        b.formats = vec![fmt];
        b.code.push(Instr::Print(0));
        let program = link(&[a, b]).unwrap();
        assert_eq!(program.formats.len(), 3);
        assert_eq!(program.code.last(), Some(&Instr::Print(2)));
    }
}
