//! Deterministic textual listing of a linked [`Program`].
//!
//! The listing is the program's low-level source: two programs render to
//! the same text exactly when they behave the same, so the text is used as
//! the cache key.

use std::fmt::Write;

use crate::ir::{Instr, Program};

/// Render `program` as a listing.
///
/// ```text
/// .kernels euler
/// .field 0 UV 2
/// .local 0 v
/// .local 1 u
/// 0000 sample.p 0
/// 0001 store.local 0
/// ...
/// ```
pub fn render(program: &Program) -> String {
    let mut out = String::new();
    // Writes to a String cannot fail.
    let _ = write_listing(&mut out, program);
    out
}

fn write_listing(out: &mut String, p: &Program) -> std::fmt::Result {
    writeln!(out, ".kernels {}", p.segments.join(" + "))?;
    for (i, f) in p.fields.iter().enumerate() {
        writeln!(out, ".field {i} {} {}", f.name, f.components)?;
    }
    for (i, c) in p.constants.iter().enumerate() {
        writeln!(out, ".const {i} {c}")?;
    }
    for (i, l) in p.locals.iter().enumerate() {
        writeln!(out, ".local {i} {l}")?;
    }
    for (i, f) in p.formats.iter().enumerate() {
        writeln!(out, ".format {i} {:?}", f.source())?;
    }
    for (pc, instr) in p.code.iter().enumerate() {
        write!(out, "{pc:04} ")?;
        match instr {
            Instr::Const(x) => writeln!(out, "const {x:?}")?,
            Instr::LoadAttr(b) => writeln!(out, "load.attr {}", b.name())?,
            Instr::StoreAttr(b) => writeln!(out, "store.attr {}", b.name())?,
            Instr::LoadVar(i) => writeln!(out, "load.var {i}")?,
            Instr::StoreVar(i, ty) => writeln!(out, "store.var {i} {}", ty.name())?,
            Instr::LoadLocal(i) => writeln!(out, "load.local {i}")?,
            Instr::StoreLocal(i) => writeln!(out, "store.local {i}")?,
            Instr::LoadTime => writeln!(out, "load.time")?,
            Instr::LoadConst(i) => writeln!(out, "load.const {i}")?,
            Instr::Binary(op) => writeln!(out, "{}", op.mnemonic())?,
            Instr::Neg => writeln!(out, "neg")?,
            Instr::Not => writeln!(out, "not")?,
            Instr::Jump(t) => writeln!(out, "jump {t:04}")?,
            Instr::JumpIfFalse(t) => writeln!(out, "jump.false {t:04}")?,
            Instr::JumpIfTrue(t) => writeln!(out, "jump.true {t:04}")?,
            Instr::Sample { field, particle } => {
                let mode = if *particle { "p" } else { "xyz" };
                writeln!(out, "sample.{mode} {field}")?
            }
            Instr::Math(f) => writeln!(out, "math.{}", f.name())?,
            Instr::Random(f) => writeln!(out, "random.{}", f.name())?,
            Instr::Print(i) => writeln!(out, "print {i}")?,
            Instr::Exit(e) => writeln!(out, "exit.{}", e.name())?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::link;
    use crate::translate::translate;
    use drift_core::VariableSchema;

    fn listing(sources: &[&str]) -> String {
        let schema = VariableSchema::empty();
        let segs: Vec<_> = sources
            .iter()
            .map(|s| translate(s, &schema).unwrap())
            .collect();
        render(&link(&segs).unwrap())
    }

    #[test]
    fn listing_is_stable() {
        let src = "fn k(p, fs, t) { p.lon += fs.U[p] * p.dt; }";
        assert_eq!(listing(&[src]), listing(&[src]));
        assert_eq!(
            listing(&[src]),
            ".kernels k\n\
             .field 0 U 1\n\
             0000 load.attr lon\n\
             0001 sample.p 0\n\
             0002 load.attr dt\n\
             0003 mul\n\
             0004 add\n\
             0005 store.attr lon\n"
        );
    }

    #[test]
    fn whitespace_and_comments_do_not_matter() {
        let a = listing(&["fn k(p, fs, t) { p.lon += 1.5; }"]);
        let b = listing(&["fn k(p,fs,t){\n  // move\n  p.lon   += 1.5;\n}"]);
        assert_eq!(a, b);
    }

    #[test]
    fn order_and_constants_matter() {
        let a = "fn a(p, fs, t) { p.lon += 1; }";
        let b = "fn b(p, fs, t) { p.lon *= 2; }";
        assert_ne!(listing(&[a, b]), listing(&[b, a]));
        assert_ne!(
            listing(&["fn a(p, fs, t) { p.lon += 0.1; }"]),
            listing(&["fn a(p, fs, t) { p.lon += 0.1000001; }"])
        );
    }
}
