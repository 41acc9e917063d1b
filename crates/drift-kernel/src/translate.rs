//! Lowering of a parsed kernel function to an IR [`Segment`].

use drift_core::{Builtin, VariableSchema};
use indexmap::{IndexMap, IndexSet};

use crate::ast::{AssignOp, BinOp, Expr, ExprKind, KernelFn, SampleAt, Stmt, StmtKind, Target};
use crate::builtins::{math_constant, MathFn, RandomFn};
use crate::error::TranslateError;
use crate::format::PrintFormat;
use crate::ir::{slot, Exit, FieldRef, Instr, Segment};
use crate::parser::parse;

/// Placeholder jump target, patched once the destination is known.
const UNPATCHED: u32 = u32::MAX;

/// Most components a field lookup can be destructured into.
const MAX_COMPONENTS: usize = 3;

/// Parse and lower one kernel source against a variable schema.
pub fn translate(source: &str, schema: &VariableSchema) -> Result<Segment, TranslateError> {
    let func = parse(source)?;
    lower(&func, schema)
}

/// Lower a parsed kernel function.
pub fn lower(func: &KernelFn, schema: &VariableSchema) -> Result<Segment, TranslateError> {
    let mut l = Lowerer {
        schema,
        kernel: &func.name,
        code: Vec::new(),
        fields: IndexMap::new(),
        constants: IndexSet::new(),
        locals: IndexSet::new(),
        formats: Vec::new(),
        assigned: IndexSet::new(),
        reads: Vec::new(),
        loops: Vec::new(),
        returns: Vec::new(),
    };
    l.block(&func.body)?;

    let end = l.here();
    for site in std::mem::take(&mut l.returns) {
        l.patch(site, end);
    }
    debug_assert!(l.loops.is_empty());

    let free_reads = l
        .reads
        .iter()
        .filter(|(name, _)| !l.assigned.contains(name))
        .fold(Vec::<(String, u32)>::new(), |mut acc, (name, line)| {
            if !acc.iter().any(|(n, _)| n == name) {
                acc.push((name.clone(), *line));
            }
            acc
        });
    let (fields, field_lines) = l
        .fields
        .into_iter()
        .map(|(name, (components, line))| (FieldRef { name, components }, line))
        .unzip();

    Ok(Segment {
        name: func.name.clone(),
        code: l.code,
        fields,
        constants: l.constants.into_iter().collect(),
        locals: l.locals.into_iter().collect(),
        formats: l.formats,
        assigned: l.assigned,
        free_reads,
        field_lines,
    })
}

struct Lowerer<'a> {
    schema: &'a VariableSchema,
    kernel: &'a str,
    code: Vec<Instr>,
    /// name -> (components, first line)
    fields: IndexMap<String, (u8, u32)>,
    constants: IndexSet<String>,
    locals: IndexSet<String>,
    formats: Vec<PrintFormat>,
    assigned: IndexSet<String>,
    reads: Vec<(String, u32)>,
    /// Pending `break` jumps per enclosing loop.
    loops: Vec<Vec<usize>>,
    /// Pending `return;` jumps to the segment end.
    returns: Vec<usize>,
}

impl Lowerer<'_> {
    fn err(&self, line: u32, construct: impl Into<String>) -> TranslateError {
        TranslateError::unsupported(self.kernel, line, construct)
    }

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    fn patch(&mut self, site: usize, target: u32) {
        match &mut self.code[site] {
            Instr::Jump(t) | Instr::JumpIfFalse(t) | Instr::JumpIfTrue(t) => *t = target,
            other => debug_assert!(false, "patching non-jump {other:?}"),
        }
    }

    fn local(&mut self, name: &str, line: u32) -> Result<u16, TranslateError> {
        let index = self.locals.insert_full(name.to_string()).0;
        slot(index, self.kernel, line, "locals")
    }

    fn store_local(&mut self, name: &str, line: u32) -> Result<(), TranslateError> {
        let slot = self.local(name, line)?;
        self.assigned.insert(name.to_string());
        self.emit(Instr::StoreLocal(slot));
        Ok(())
    }

    // ── Statements ─────────────────────────────────────────────────

    fn block(&mut self, body: &[Stmt]) -> Result<(), TranslateError> {
        body.iter().try_for_each(|s| self.stmt(s))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), TranslateError> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Let { names, value } => {
                if names.len() == 1 {
                    self.expr(value)?;
                    self.store_local(&names[0], line)?;
                    return Ok(());
                }
                let ExprKind::Sample { field, at } = &value.kind else {
                    return Err(self.err(line, "only field samples can be destructured"));
                };
                debug_assert!(names.len() <= MAX_COMPONENTS);
                self.sample(field, at, names.len() as u8, value.line)?;
                for name in names.iter().rev() {
                    self.store_local(name, line)?;
                }
            }
            StmtKind::Assign { target, op, value } => {
                if *op != AssignOp::Set {
                    self.load_target(target, line)?;
                }
                self.expr(value)?;
                match op {
                    AssignOp::Set => {}
                    AssignOp::Add => _ = self.emit(Instr::Binary(BinOp::Add)),
                    AssignOp::Sub => _ = self.emit(Instr::Binary(BinOp::Sub)),
                    AssignOp::Mul => _ = self.emit(Instr::Binary(BinOp::Mul)),
                    AssignOp::Div => _ = self.emit(Instr::Binary(BinOp::Div)),
                }
                self.store_target(target, line)?;
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                let to_else = self.emit(Instr::JumpIfFalse(UNPATCHED));
                self.block(then)?;
                if otherwise.is_empty() {
                    let end = self.here();
                    self.patch(to_else, end);
                } else {
                    let to_end = self.emit(Instr::Jump(UNPATCHED));
                    let else_start = self.here();
                    self.patch(to_else, else_start);
                    self.block(otherwise)?;
                    let end = self.here();
                    self.patch(to_end, end);
                }
            }
            StmtKind::While { cond, body } => {
                let top = self.here();
                self.expr(cond)?;
                let exit = self.emit(Instr::JumpIfFalse(UNPATCHED));
                self.loops.push(Vec::new());
                self.block(body)?;
                self.emit(Instr::Jump(top));
                let end = self.here();
                self.patch(exit, end);
                for site in self.loops.pop().unwrap_or_default() {
                    self.patch(site, end);
                }
            }
            StmtKind::Break => {
                let site = self.emit(Instr::Jump(UNPATCHED));
                match self.loops.last_mut() {
                    Some(pending) => pending.push(site),
                    None => return Err(self.err(line, "'break' outside of a loop")),
                }
            }
            StmtKind::Return(status) => match status.as_deref() {
                None | Some("Success") => {
                    let site = self.emit(Instr::Jump(UNPATCHED));
                    self.returns.push(site);
                }
                Some("Delete") => _ = self.emit(Instr::Exit(Exit::Delete)),
                Some("Error") => _ = self.emit(Instr::Exit(Exit::Error)),
                Some("StopExecution") => _ = self.emit(Instr::Exit(Exit::Stop)),
                Some(other) => {
                    return Err(self.err(
                        line,
                        format!(
                            "unknown status '{other}'; expected Success, Delete, Error or StopExecution"
                        ),
                    ))
                }
            },
            StmtKind::Delete => _ = self.emit(Instr::Exit(Exit::Delete)),
            StmtKind::Print { format, args } => {
                let parsed = PrintFormat::parse(format).map_err(|e| self.err(line, e))?;
                if parsed.arity() != args.len() {
                    return Err(self.err(
                        line,
                        format!(
                            "print format expects {} values, got {}",
                            parsed.arity(),
                            args.len()
                        ),
                    ));
                }
                for a in args {
                    self.expr(a)?;
                }
                let idx = slot(self.formats.len(), self.kernel, line, "print formats")?;
                self.formats.push(parsed);
                self.emit(Instr::Print(idx));
            }
        }
        Ok(())
    }

    fn attr(&self, name: &str, line: u32) -> Result<Result<Builtin, u16>, TranslateError> {
        if let Some(b) = Builtin::from_name(name) {
            return Ok(Ok(b));
        }
        self.schema
            .index_of(name)
            .ok_or_else(|| self.err(line, format!("unknown particle variable '{name}'")))
            .and_then(|i| slot(i, self.kernel, line, "particle variables").map(Err))
    }

    fn load_target(&mut self, target: &Target, line: u32) -> Result<(), TranslateError> {
        match target {
            Target::Local(name) => {
                self.reads.push((name.clone(), line));
                let slot = self.local(name, line)?;
                self.emit(Instr::LoadLocal(slot));
            }
            Target::Attr(name) => match self.attr(name, line)? {
                Ok(b) => _ = self.emit(Instr::LoadAttr(b)),
                Err(slot) => _ = self.emit(Instr::LoadVar(slot)),
            },
        }
        Ok(())
    }

    fn store_target(&mut self, target: &Target, line: u32) -> Result<(), TranslateError> {
        match target {
            Target::Local(name) => self.store_local(name, line)?,
            Target::Attr(name) => match self.attr(name, line)? {
                Ok(b) if !b.is_writable() => {
                    return Err(self.err(line, format!("particle.{name} is read-only")))
                }
                Ok(b) => _ = self.emit(Instr::StoreAttr(b)),
                Err(slot) => {
                    let ty = self
                        .schema
                        .get(usize::from(slot))
                        .map(|v| v.var_type)
                        .ok_or_else(|| self.err(line, format!("unknown particle variable '{name}'")))?;
                    self.emit(Instr::StoreVar(slot, ty));
                }
            },
        }
        Ok(())
    }

    // ── Expressions ────────────────────────────────────────────────

    fn sample(
        &mut self,
        field: &str,
        at: &SampleAt,
        components: u8,
        line: u32,
    ) -> Result<(), TranslateError> {
        let particle = match at {
            SampleAt::Particle => true,
            SampleAt::Explicit(coords) => {
                for c in coords.iter() {
                    self.expr(c)?;
                }
                false
            }
        };
        let existing = self.fields.get_full(field).map(|(i, _, &(n, _))| (i, n));
        let idx = match existing {
            Some((_, n)) if n != components => {
                return Err(self.err(
                    line,
                    format!("field '{field}' is used with both {n} and {components} components"),
                ))
            }
            Some((i, _)) => i,
            None => self.fields.insert_full(field.to_string(), (components, line)).0,
        };
        let field = slot(idx, self.kernel, line, "fields")?;
        self.emit(Instr::Sample {
            field,
            particle,
        });
        Ok(())
    }

    fn args(&mut self, what: &str, expected: usize, args: &[Expr], line: u32) -> Result<(), TranslateError> {
        if args.len() != expected {
            return Err(self.err(
                line,
                format!("{what} takes {expected} arguments, got {}", args.len()),
            ));
        }
        args.iter().try_for_each(|a| self.expr(a))
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), TranslateError> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Num(x) => _ = self.emit(Instr::Const(*x)),
            ExprKind::Bool(b) => _ = self.emit(Instr::Const(f64::from(u8::from(*b)))),
            ExprKind::Local(name) => {
                self.reads.push((name.clone(), line));
                let slot = self.local(name, line)?;
                self.emit(Instr::LoadLocal(slot));
            }
            ExprKind::Time => _ = self.emit(Instr::LoadTime),
            ExprKind::Attr(name) => self.load_target(&Target::Attr(name.clone()), line)?,
            ExprKind::Constant(name) => {
                let index = self.constants.insert_full(name.clone()).0;
                let idx = slot(index, self.kernel, line, "constants")?;
                self.emit(Instr::LoadConst(idx));
            }
            ExprKind::Sample { field, at } => self.sample(field, at, 1, line)?,
            ExprKind::Math { func, args } => {
                let f = MathFn::from_name(func)
                    .ok_or_else(|| self.err(line, format!("unknown function 'math.{func}'")))?;
                self.args(&format!("math.{func}"), f.arity(), args, line)?;
                self.emit(Instr::Math(f));
            }
            ExprKind::MathConst(name) => {
                let v = math_constant(name)
                    .ok_or_else(|| self.err(line, format!("unknown constant 'math.{name}'")))?;
                self.emit(Instr::Const(v));
            }
            ExprKind::Random { func, args } => {
                let f = RandomFn::from_name(func)
                    .ok_or_else(|| self.err(line, format!("unknown function 'random.{func}'")))?;
                self.args(&format!("random.{func}"), f.arity(), args, line)?;
                self.emit(Instr::Random(f));
            }
            ExprKind::Neg(inner) => {
                self.expr(inner)?;
                self.emit(Instr::Neg);
            }
            ExprKind::Not(inner) => {
                self.expr(inner)?;
                self.emit(Instr::Not);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.emit(Instr::Binary(*op));
            }
            ExprKind::And(lhs, rhs) => self.short_circuit(lhs, rhs, false)?,
            ExprKind::Or(lhs, rhs) => self.short_circuit(lhs, rhs, true)?,
        }
        Ok(())
    }

    /// `a && b` / `a || b`, yielding 1.0 or 0.0. `rhs` is skipped when
    /// `lhs` alone decides the result.
    fn short_circuit(&mut self, lhs: &Expr, rhs: &Expr, is_or: bool) -> Result<(), TranslateError> {
        let decided = |t| {
            if is_or {
                Instr::JumpIfTrue(t)
            } else {
                Instr::JumpIfFalse(t)
            }
        };
        self.expr(lhs)?;
        let first = self.emit(decided(UNPATCHED));
        self.expr(rhs)?;
        let second = self.emit(decided(UNPATCHED));
        self.emit(Instr::Const(if is_or { 0.0 } else { 1.0 }));
        let to_end = self.emit(Instr::Jump(UNPATCHED));
        let short = self.here();
        self.patch(first, short);
        self.patch(second, short);
        self.emit(Instr::Const(if is_or { 1.0 } else { 0.0 }));
        let end = self.here();
        self.patch(to_end, end);
        Ok(())
    }
}
