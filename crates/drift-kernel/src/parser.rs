//! Recursive-descent parser for kernel functions.
//!
//! ```text
//! fn advect(particle, fieldset, time) {
//!     let (u, v) = fieldset.UV[time, particle.depth, particle.lat, particle.lon];
//!     particle.lon += u * particle.dt;
//!     particle.lat += v * particle.dt;
//! }
//! ```

use smallvec::smallvec;

use crate::ast::{AssignOp, BinOp, Expr, ExprKind, KernelFn, SampleAt, Stmt, StmtKind, Target};
use crate::error::TranslateError;
use crate::lexer::{tokenize, Spanned, Token};

/// Deepest nesting of blocks and expressions a kernel may use. Operator
/// chains count one level per operator.
pub const MAX_NESTING: usize = 128;

/// Namespaces and statement words that cannot be parameter or local names.
const RESERVED: &[&str] = &["math", "random", "print"];

/// Token stream with lookahead and line tracking.
struct TokenStream<'src> {
    tokens: &'src [Spanned],
    pos: usize,
}

impl<'src> TokenStream<'src> {
    fn new(tokens: &'src [Spanned]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|s| &s.token);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Line of the current token, or of the last one at end of input.
    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }
}

struct Parser<'src> {
    stream: TokenStream<'src>,
    kernel: String,
    particle: String,
    fieldset: String,
    time: String,
    loop_depth: usize,
    depth: usize,
}

/// Parse a kernel source holding exactly one function.
pub fn parse(source: &str) -> Result<KernelFn, TranslateError> {
    let tokens = tokenize(source).map_err(|line| {
        TranslateError::unsupported("<source>", line, "unrecognised character")
    })?;
    let mut p = Parser {
        stream: TokenStream::new(&tokens),
        kernel: "<source>".to_string(),
        particle: String::new(),
        fieldset: String::new(),
        time: String::new(),
        loop_depth: 0,
        depth: 0,
    };
    p.kernel_fn()
}

impl Parser<'_> {
    fn err(&self, construct: impl Into<String>) -> TranslateError {
        TranslateError::unsupported(&self.kernel, self.stream.line(), construct)
    }

    /// Enter one nesting level.
    fn descend(&mut self) -> Result<(), TranslateError> {
        if self.depth >= MAX_NESTING {
            return Err(self.err(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        Ok(())
    }

    /// Parse `f` one nesting level down.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TranslateError>,
    ) -> Result<T, TranslateError> {
        self.descend()?;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn expect(&mut self, expected: Token) -> Result<(), TranslateError> {
        if self.stream.check(&expected) {
            self.stream.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '{expected}', found {}", self.found())))
        }
    }

    fn found(&self) -> String {
        match self.stream.peek() {
            Some(t) => format!("'{t}'"),
            None => "end of input".to_string(),
        }
    }

    fn ident(&mut self) -> Result<String, TranslateError> {
        match self.stream.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.stream.advance();
                Ok(name)
            }
            _ => Err(self.err(format!("expected a name, found {}", self.found()))),
        }
    }

    fn kernel_fn(&mut self) -> Result<KernelFn, TranslateError> {
        self.expect(Token::Fn)?;
        let name = self.ident()?;
        self.kernel = name.clone();
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.stream.check(&Token::RParen) {
            params.push(self.ident()?);
            while self.stream.check(&Token::Comma) {
                self.stream.advance();
                params.push(self.ident()?);
            }
        }
        self.expect(Token::RParen)?;
        let [particle, fieldset, time]: [String; 3] = params.try_into().map_err(|_| {
            self.err("kernel functions take exactly three parameters: particle, fieldset, time")
        })?;
        for (i, p) in [&particle, &fieldset, &time].into_iter().enumerate() {
            if RESERVED.contains(&p.as_str()) {
                return Err(self.err(format!("'{p}' cannot be used as a parameter name")));
            }
            if [&particle, &fieldset, &time][..i].contains(&p) {
                return Err(self.err(format!("parameter '{p}' is declared twice")));
            }
        }
        self.particle = particle.clone();
        self.fieldset = fieldset.clone();
        self.time = time.clone();

        let body = self.block()?;
        if !self.stream.at_end() {
            return Err(self.err("only one function is allowed per kernel source"));
        }
        Ok(KernelFn {
            name,
            params: [particle, fieldset, time],
            body,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, TranslateError> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, TranslateError> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !self.stream.check(&Token::RBrace) {
            if self.stream.at_end() {
                return Err(self.err("unterminated block"));
            }
            body.push(self.stmt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn stmt(&mut self) -> Result<Stmt, TranslateError> {
        let line = self.stream.line();
        let kind = match self.stream.peek() {
            Some(Token::Let) => self.let_stmt()?,
            Some(Token::If) => self.if_stmt()?,
            Some(Token::While) => {
                self.stream.advance();
                let cond = self.expr()?;
                self.loop_depth += 1;
                let body = self.block();
                self.loop_depth -= 1;
                StmtKind::While { cond, body: body? }
            }
            Some(Token::For) => {
                return Err(self.err("'for' loops are not supported; use 'while'"));
            }
            Some(Token::Fn) => return Err(self.err("nested functions are not supported")),
            Some(Token::Break) => {
                if self.loop_depth == 0 {
                    return Err(self.err("'break' outside of a loop"));
                }
                self.stream.advance();
                self.expect(Token::Semi)?;
                StmtKind::Break
            }
            Some(Token::Return) => {
                self.stream.advance();
                let status = match self.stream.peek() {
                    Some(Token::Ident(_)) => Some(self.ident()?),
                    _ => None,
                };
                self.expect(Token::Semi)?;
                StmtKind::Return(status)
            }
            Some(Token::Ident(_)) => self.ident_stmt()?,
            _ => return Err(self.err(format!("expected a statement, found {}", self.found()))),
        };
        Ok(Stmt { kind, line })
    }

    fn let_stmt(&mut self) -> Result<StmtKind, TranslateError> {
        self.expect(Token::Let)?;
        let names = if self.stream.check(&Token::LParen) {
            self.stream.advance();
            let mut names = smallvec![self.local_name()?];
            while self.stream.check(&Token::Comma) {
                self.stream.advance();
                names.push(self.local_name()?);
            }
            self.expect(Token::RParen)?;
            if names.len() > 3 {
                return Err(self.err("tuples have at most three components"));
            }
            names
        } else {
            smallvec![self.local_name()?]
        };
        self.expect(Token::Assign)?;
        let value = self.expr()?;
        self.expect(Token::Semi)?;
        Ok(StmtKind::Let { names, value })
    }

    fn local_name(&mut self) -> Result<String, TranslateError> {
        let name = self.ident()?;
        if RESERVED.contains(&name.as_str())
            || name == self.particle
            || name == self.fieldset
            || name == self.time
        {
            return Err(self.err(format!("'{name}' cannot be used as a local name")));
        }
        Ok(name)
    }

    fn if_stmt(&mut self) -> Result<StmtKind, TranslateError> {
        self.expect(Token::If)?;
        let cond = self.expr()?;
        let then = self.block()?;
        let otherwise = if self.stream.check(&Token::Else) {
            self.stream.advance();
            if self.stream.check(&Token::If) {
                let line = self.stream.line();
                vec![Stmt {
                    kind: self.if_stmt()?,
                    line,
                }]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(StmtKind::If {
            cond,
            then,
            otherwise,
        })
    }

    fn ident_stmt(&mut self) -> Result<StmtKind, TranslateError> {
        let name = self.ident()?;
        if name == "print" {
            return self.print_stmt();
        }
        let target = if name == self.particle {
            self.expect(Token::Dot)?;
            let attr = self.ident()?;
            if attr == "delete" && self.stream.check(&Token::LParen) {
                self.stream.advance();
                self.expect(Token::RParen)?;
                self.expect(Token::Semi)?;
                return Ok(StmtKind::Delete);
            }
            Target::Attr(attr)
        } else if name == self.fieldset || name == self.time || RESERVED.contains(&name.as_str()) {
            return Err(self.err(format!("'{name}' cannot be assigned to")));
        } else {
            Target::Local(name)
        };

        let op = match self.stream.peek() {
            Some(Token::Assign) => AssignOp::Set,
            Some(Token::PlusAssign) => AssignOp::Add,
            Some(Token::MinusAssign) => AssignOp::Sub,
            Some(Token::StarAssign) => AssignOp::Mul,
            Some(Token::SlashAssign) => AssignOp::Div,
            Some(Token::LParen) => return Err(self.err("method calls are not supported")),
            _ => {
                return Err(self.err(format!(
                    "expected an assignment, found {}",
                    self.found()
                )))
            }
        };
        self.stream.advance();
        let value = self.expr()?;
        self.expect(Token::Semi)?;
        Ok(StmtKind::Assign { target, op, value })
    }

    fn print_stmt(&mut self) -> Result<StmtKind, TranslateError> {
        self.expect(Token::LParen)?;
        let format = match self.stream.peek() {
            Some(Token::Str(s)) => s.clone(),
            _ => return Err(self.err("print takes a format string first")),
        };
        self.stream.advance();
        let mut args = Vec::new();
        while self.stream.check(&Token::Comma) {
            self.stream.advance();
            args.push(self.expr()?);
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Semi)?;
        Ok(StmtKind::Print { format, args })
    }

    // ── Expressions ────────────────────────────────────────────────

    fn expr(&mut self) -> Result<Expr, TranslateError> {
        self.nested(Self::or_expr)
    }

    fn or_expr(&mut self) -> Result<Expr, TranslateError> {
        let base = self.depth;
        let mut lhs = self.and_expr()?;
        while self.stream.check(&Token::Or) {
            self.descend()?;
            let line = self.stream.line();
            self.stream.advance();
            let rhs = self.and_expr()?;
            lhs = Expr {
                kind: ExprKind::Or(Box::new(lhs), Box::new(rhs)),
                line,
            };
        }
        self.depth = base;
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, TranslateError> {
        let base = self.depth;
        let mut lhs = self.not_expr()?;
        while self.stream.check(&Token::And) {
            self.descend()?;
            let line = self.stream.line();
            self.stream.advance();
            let rhs = self.not_expr()?;
            lhs = Expr {
                kind: ExprKind::And(Box::new(lhs), Box::new(rhs)),
                line,
            };
        }
        self.depth = base;
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, TranslateError> {
        if self.stream.check(&Token::Not) {
            let line = self.stream.line();
            self.stream.advance();
            let inner = self.nested(Self::not_expr)?;
            return Ok(Expr {
                kind: ExprKind::Not(Box::new(inner)),
                line,
            });
        }
        self.cmp_expr()
    }

    fn cmp_op(&self) -> Option<BinOp> {
        match self.stream.peek() {
            Some(Token::Eq) => Some(BinOp::Eq),
            Some(Token::Ne) => Some(BinOp::Ne),
            Some(Token::Lt) => Some(BinOp::Lt),
            Some(Token::Le) => Some(BinOp::Le),
            Some(Token::Gt) => Some(BinOp::Gt),
            Some(Token::Ge) => Some(BinOp::Ge),
            _ => None,
        }
    }

    fn cmp_expr(&mut self) -> Result<Expr, TranslateError> {
        let lhs = self.add_expr()?;
        let Some(op) = self.cmp_op() else {
            return Ok(lhs);
        };
        let line = self.stream.line();
        self.stream.advance();
        let rhs = self.add_expr()?;
        if self.cmp_op().is_some() {
            return Err(self.err("chained comparisons are not supported"));
        }
        Ok(binary(op, lhs, rhs, line))
    }

    fn add_expr(&mut self) -> Result<Expr, TranslateError> {
        let base = self.depth;
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.stream.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.descend()?;
            let line = self.stream.line();
            self.stream.advance();
            let rhs = self.mul_expr()?;
            lhs = binary(op, lhs, rhs, line);
        }
    }

    fn mul_expr(&mut self) -> Result<Expr, TranslateError> {
        let base = self.depth;
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.stream.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.descend()?;
            let line = self.stream.line();
            self.stream.advance();
            let rhs = self.unary_expr()?;
            lhs = binary(op, lhs, rhs, line);
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, TranslateError> {
        if self.stream.check(&Token::Minus) {
            let line = self.stream.line();
            self.stream.advance();
            let inner = self.nested(Self::unary_expr)?;
            return Ok(Expr {
                kind: ExprKind::Neg(Box::new(inner)),
                line,
            });
        }
        self.power_expr()
    }

    fn power_expr(&mut self) -> Result<Expr, TranslateError> {
        let base = self.primary()?;
        if self.stream.check(&Token::StarStar) {
            let line = self.stream.line();
            self.stream.advance();
            let exp = self.nested(Self::unary_expr)?;
            return Ok(binary(BinOp::Pow, base, exp, line));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, TranslateError> {
        let line = self.stream.line();
        let kind = match self.stream.peek().cloned() {
            Some(Token::Integer(n)) => {
                self.stream.advance();
                ExprKind::Num(n as f64)
            }
            Some(Token::Float(x)) => {
                self.stream.advance();
                ExprKind::Num(x)
            }
            Some(Token::True) => {
                self.stream.advance();
                ExprKind::Bool(true)
            }
            Some(Token::False) => {
                self.stream.advance();
                ExprKind::Bool(false)
            }
            Some(Token::LParen) => {
                self.stream.advance();
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Some(Token::Ident(name)) => {
                self.stream.advance();
                self.name_expr(name)?
            }
            _ => return Err(self.err(format!("expected an expression, found {}", self.found()))),
        };
        Ok(Expr { kind, line })
    }

    fn name_expr(&mut self, name: String) -> Result<ExprKind, TranslateError> {
        if name == self.time {
            return Ok(ExprKind::Time);
        }
        if name == self.particle {
            if !self.stream.check(&Token::Dot) {
                return Err(self.err(format!("'{name}' cannot be used as a value")));
            }
            self.stream.advance();
            let attr = self.ident()?;
            if self.stream.check(&Token::LParen) {
                return Err(self.err("method calls are not supported in expressions"));
            }
            return Ok(ExprKind::Attr(attr));
        }
        if name == self.fieldset {
            self.expect(Token::Dot)?;
            let field = self.ident()?;
            if !self.stream.check(&Token::LBracket) {
                return Ok(ExprKind::Constant(field));
            }
            self.stream.advance();
            let at = self.sample_at()?;
            self.expect(Token::RBracket)?;
            return Ok(ExprKind::Sample { field, at });
        }
        match name.as_str() {
            "math" => {
                self.expect(Token::Dot)?;
                let func = self.ident()?;
                if self.stream.check(&Token::LParen) {
                    let args = self.call_args()?;
                    Ok(ExprKind::Math { func, args })
                } else {
                    Ok(ExprKind::MathConst(func))
                }
            }
            "random" => {
                self.expect(Token::Dot)?;
                let func = self.ident()?;
                let args = self.call_args()?;
                Ok(ExprKind::Random { func, args })
            }
            "print" => Err(self.err("print is a statement, not a value")),
            _ if self.stream.check(&Token::Dot) => {
                Err(self.err(format!("unknown namespace '{name}'")))
            }
            _ if self.stream.check(&Token::LParen) => {
                Err(self.err(format!("unknown function '{name}'")))
            }
            _ if self.stream.check(&Token::LBracket) => {
                Err(self.err("indexing is only supported on fields"))
            }
            _ => Ok(ExprKind::Local(name)),
        }
    }

    fn sample_at(&mut self) -> Result<SampleAt, TranslateError> {
        if let (Some(Token::Ident(n)), Some(Token::RBracket)) =
            (self.stream.peek(), self.stream.peek_nth(1))
        {
            if *n == self.particle {
                self.stream.advance();
                return Ok(SampleAt::Particle);
            }
        }
        let mut coords = Vec::with_capacity(4);
        coords.push(self.expr()?);
        while self.stream.check(&Token::Comma) {
            self.stream.advance();
            coords.push(self.expr()?);
        }
        let coords: [Expr; 4] = coords.try_into().map_err(|_| {
            self.err("field subscripts take [time, depth, lat, lon] or [particle]")
        })?;
        Ok(SampleAt::Explicit(Box::new(coords)))
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, TranslateError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.stream.check(&Token::RParen) {
            args.push(self.expr()?);
            while self.stream.check(&Token::Comma) {
                self.stream.advance();
                args.push(self.expr()?);
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, line: u32) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        line,
    }
}
