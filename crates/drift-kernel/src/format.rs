//! `print` format strings: `{}`, `{:.N}`, with `{{` and `}}` escapes.

use std::fmt::Write;

/// One piece of a parsed format string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Piece {
    /// Literal text.
    Text(String),
    /// A value; `Some(n)` prints `n` decimals.
    Value(Option<u8>),
}

/// A validated format string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrintFormat {
    pieces: Vec<Piece>,
    source: String,
}

impl PrintFormat {
    /// Parse a format string. Returns a description of the first problem.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut pieces = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '}' => return Err("unmatched '}' in format string".into()),
                '{' => {
                    let mut spec = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => spec.push(c),
                            None => return Err("unterminated '{' in format string".into()),
                        }
                    }
                    let precision = match spec.as_str() {
                        "" => None,
                        s => Some(
                            s.strip_prefix(":.")
                                .and_then(|n| n.parse::<u8>().ok())
                                .filter(|n| *n <= 17)
                                .ok_or_else(|| format!("unsupported format spec '{{{s}}}'"))?,
                        ),
                    };
                    if !text.is_empty() {
                        pieces.push(Piece::Text(std::mem::take(&mut text)));
                    }
                    pieces.push(Piece::Value(precision));
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }
        Ok(Self {
            pieces,
            source: source.to_string(),
        })
    }

    /// Number of values the format consumes.
    pub fn arity(&self) -> usize {
        self.pieces
            .iter()
            .filter(|p| matches!(p, Piece::Value(_)))
            .count()
    }

    /// The original format string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render with `values`, which must hold [`arity`](Self::arity) entries.
    pub fn render(&self, values: &[f64]) -> String {
        let mut out = String::new();
        let mut values = values.iter();
        for piece in &self.pieces {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Value(precision) => {
                    let v = values.next().copied().unwrap_or(f64::NAN);
                    let _ = match precision {
                        Some(p) => write!(out, "{v:.*}", usize::from(*p)),
                        None => write!(out, "{v}"),
                    };
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_values_and_escapes() {
        let f = PrintFormat::parse("p at {{{:.2}, {}}}").unwrap();
        assert_eq!(f.arity(), 2);
        assert_eq!(f.render(&[1.0 / 3.0, 4.0]), "p at {0.33, 4}");
    }

    #[test]
    fn rejects_bad_specs() {
        assert!(PrintFormat::parse("{x}").is_err());
        assert!(PrintFormat::parse("{:.a}").is_err());
        assert!(PrintFormat::parse("open {").is_err());
        assert!(PrintFormat::parse("close }").is_err());
    }
}
