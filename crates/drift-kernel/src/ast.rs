//! Syntax tree for one kernel function.
//!
//! The parser resolves the three parameter roles (particle, field-access
//! context, time) by position, so references through them are already
//! classified here. Everything that depends on the variable schema is left
//! to translation.

use smallvec::SmallVec;

/// One parsed kernel function.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelFn {
    /// Function name.
    pub name: String,
    /// Parameter names, in role order: particle, field set, time.
    pub params: [String; 3],
    /// Body statements.
    pub body: Vec<Stmt>,
}

/// A statement with its source line.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    /// What the statement does.
    pub kind: StmtKind,
    /// 1-based source line.
    pub line: u32,
}

/// Statement kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// `let x = e;` (one name) or `let (a, b) = fieldset.F[..];`.
    Let {
        /// Bound local names, one per destructured component.
        names: SmallVec<[String; 3]>,
        /// Right-hand side.
        value: Expr,
    },
    /// `target op= e;`
    Assign {
        /// What is assigned.
        target: Target,
        /// Plain or compound assignment.
        op: AssignOp,
        /// Right-hand side.
        value: Expr,
    },
    /// `if c { .. } else { .. }`; `else if` nests in `otherwise`.
    If {
        /// Condition.
        cond: Expr,
        /// Taken branch.
        then: Vec<Stmt>,
        /// Else branch, possibly empty.
        otherwise: Vec<Stmt>,
    },
    /// `while c { .. }`
    While {
        /// Condition.
        cond: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `break;`
    Break,
    /// `return;` or `return Status;`
    Return(Option<String>),
    /// `particle.delete();`
    Delete,
    /// `print("fmt", args..);`
    Print {
        /// Format string.
        format: String,
        /// Arguments.
        args: Vec<Expr>,
    },
}

/// Assignment target.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// A local variable.
    Local(String),
    /// `particle.NAME`
    Attr(String),
}

/// Assignment operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
}

/// Binary arithmetic and comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%` (floored, sign follows the divisor)
    Rem,
    /// `**`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinOp {
    /// Mnemonic used in listings.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "rem",
            Self::Pow => "pow",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
        }
    }

    /// Apply to two operands. Comparisons yield 1.0 or 0.0.
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Rem => a - b * (a / b).floor(),
            Self::Pow => a.powf(b),
            Self::Eq => f64::from(u8::from(a == b)),
            Self::Ne => f64::from(u8::from(a != b)),
            Self::Lt => f64::from(u8::from(a < b)),
            Self::Le => f64::from(u8::from(a <= b)),
            Self::Gt => f64::from(u8::from(a > b)),
            Self::Ge => f64::from(u8::from(a >= b)),
        }
    }
}

/// Where a field subscript samples.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleAt {
    /// `fieldset.F[particle]`: the particle's time, depth, lat and lon.
    Particle,
    /// `fieldset.F[t, z, y, x]`
    Explicit(Box<[Expr; 4]>),
}

/// An expression with its source line.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// Expression kind.
    pub kind: ExprKind,
    /// 1-based source line.
    pub line: u32,
}

/// Expression kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Numeric literal.
    Num(f64),
    /// `true` / `false`.
    Bool(bool),
    /// A local variable.
    Local(String),
    /// The time parameter.
    Time,
    /// `particle.NAME`
    Attr(String),
    /// `fieldset.NAME` without a subscript: a named constant.
    Constant(String),
    /// `fieldset.NAME[..]`
    Sample {
        /// Field name.
        field: String,
        /// Sampling position.
        at: SampleAt,
    },
    /// `math.NAME(args)`
    Math {
        /// Function name.
        func: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `math.NAME` without a call (`pi`, `e`).
    MathConst(String),
    /// `random.NAME(args)`
    Random {
        /// Function name.
        func: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Unary minus.
    Neg(Box<Expr>),
    /// Logical not.
    Not(Box<Expr>),
    /// Arithmetic or comparison.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Short-circuit and.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit or.
    Or(Box<Expr>, Box<Expr>),
}
