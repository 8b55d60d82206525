//! Expression parsing, binding, and evaluation.
//!
//! Expressions are parsed once into a small tree. Identifiers start out as
//! [`Expr::Ident`] nodes; binding rewrites them into [`Expr::Slot`] indexes
//! into the shared scalar workspace, after which evaluation is a straight
//! tree walk with no name lookups and no allocation.

use serde::{Deserialize, Serialize};

use crate::Float;

/// Binary operators, in source precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Pow => 4,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }
}

/// The fixed function library available inside model expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Exp,
    Log,
    Log10,
    Sqrt,
    Abs,
    Pow,
    Min,
    Max,
    Floor,
    Ceil,
    Round,
    Sign,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "atan2" => Func::Atan2,
            "exp" => Func::Exp,
            "log" => Func::Log,
            "log10" => Func::Log10,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "pow" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            "sign" => Func::Sign,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Atan2 | Func::Pow | Func::Min | Func::Max => 2,
            _ => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Atan2 => "atan2",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Log10 => "log10",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Pow => "pow",
            Func::Min => "min",
            Func::Max => "max",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
            Func::Round => "round",
            Func::Sign => "sign",
        }
    }

    fn apply(self, args: &[Float]) -> Float {
        match self {
            Func::Sin => args[0].sin(),
            Func::Cos => args[0].cos(),
            Func::Tan => args[0].tan(),
            Func::Asin => args[0].asin(),
            Func::Acos => args[0].acos(),
            Func::Atan => args[0].atan(),
            Func::Atan2 => args[0].atan2(args[1]),
            Func::Exp => args[0].exp(),
            Func::Log => args[0].ln(),
            Func::Log10 => args[0].log10(),
            Func::Sqrt => args[0].sqrt(),
            Func::Abs => args[0].abs(),
            Func::Pow => args[0].powf(args[1]),
            Func::Min => args[0].min(args[1]),
            Func::Max => args[0].max(args[1]),
            Func::Floor => args[0].floor(),
            Func::Ceil => args[0].ceil(),
            Func::Round => args[0].round(),
            Func::Sign => {
                if args[0] > 0.0 {
                    1.0
                } else if args[0] < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// An expression tree over the shared workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Num(Float),
    /// Unresolved identifier, as parsed.
    Ident(String),
    /// Workspace index, after binding.
    Slot(usize),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    /// Evaluate against the workspace. Unbound identifiers evaluate to NaN;
    /// binding happens before any evaluation path can reach one.
    pub fn eval(&self, ws: &[Float]) -> Float {
        match self {
            Expr::Num(v) => *v,
            Expr::Slot(i) => ws[*i],
            Expr::Ident(_) => Float::NAN,
            Expr::Neg(e) => -e.eval(ws),
            Expr::Bin(op, a, b) => {
                let x = a.eval(ws);
                let y = b.eval(ws);
                match op {
                    BinOp::Add => x + y,
                    BinOp::Sub => x - y,
                    BinOp::Mul => x * y,
                    BinOp::Div => x / y,
                    BinOp::Pow => x.powf(y),
                }
            }
            Expr::Call(func, args) => {
                let mut vals = [0.0; 2];
                for (i, a) in args.iter().enumerate() {
                    vals[i] = a.eval(ws);
                }
                func.apply(&vals[..args.len()])
            }
        }
    }

    /// Rewrite every `Ident` into a `Slot` through `lookup`; the first
    /// unresolvable name is returned as the error.
    pub fn bind(&mut self, lookup: &dyn Fn(&str) -> Option<usize>) -> Result<(), String> {
        match self {
            Expr::Num(_) | Expr::Slot(_) => Ok(()),
            Expr::Ident(name) => match lookup(name) {
                Some(slot) => {
                    *self = Expr::Slot(slot);
                    Ok(())
                }
                None => Err(name.clone()),
            },
            Expr::Neg(e) => e.bind(lookup),
            Expr::Bin(_, a, b) => {
                a.bind(lookup)?;
                b.bind(lookup)
            }
            Expr::Call(_, args) => {
                for a in args {
                    a.bind(lookup)?;
                }
                Ok(())
            }
        }
    }

    fn fmt_prec(&self, out: &mut String, parent: u8) {
        match self {
            Expr::Num(v) => out.push_str(&format_number(*v)),
            Expr::Ident(name) => out.push_str(name),
            Expr::Slot(i) => {
                out.push_str("_s");
                out.push_str(&i.to_string());
            }
            Expr::Neg(e) => {
                let wrap = parent > 3;
                if wrap {
                    out.push('(');
                }
                out.push('-');
                e.fmt_prec(out, 3);
                if wrap {
                    out.push(')');
                }
            }
            Expr::Bin(op, a, b) => {
                let prec = op.precedence();
                let wrap = parent > prec;
                if wrap {
                    out.push('(');
                }
                // '-' and '/' are left-associative, '^' right-associative
                a.fmt_prec(out, if *op == BinOp::Pow { prec + 1 } else { prec });
                out.push_str(op.symbol());
                b.fmt_prec(out, if *op == BinOp::Pow { prec } else { prec + 1 });
                if wrap {
                    out.push(')');
                }
            }
            Expr::Call(func, args) => {
                out.push_str(func.name());
                out.push('(');
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    a.fmt_prec(out, 0);
                }
                out.push(')');
            }
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = String::new();
        self.fmt_prec(&mut s, 0);
        f.write_str(&s)
    }
}

/// Render a scalar so it reparses to the same value.
pub(crate) fn format_number(v: Float) -> String {
    let a = v.abs();
    if a != 0.0 && (a < 1e-4 || a >= 1e16) {
        format!("{v:e}")
    } else {
        format!("{v}")
    }
}

// ---------------------------------------------------------------------------
// Tokenizer and recursive-descent parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(Float),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i] as char;
        match ch {
            ' ' | '\t' => i += 1,
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '/' => {
                toks.push(Tok::Slash);
                i += 1;
            }
            '^' => {
                toks.push(Tok::Caret);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'.' {
                    i += 1;
                    while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                        i += 1;
                    }
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &src[start..i];
                let value: Float = text
                    .parse()
                    .map_err(|_| format!("malformed number `{text}`"))?;
                toks.push(Tok::Num(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                toks.push(Tok::Ident(src[start..i].to_string()));
            }
            _ => return Err(format!("unexpected character `{ch}`")),
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Tok) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // factor := '-' factor | power ; power := primary ['^' factor]
    fn factor(&mut self) -> Result<Expr, String> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Neg(Box::new(self.factor()?)));
        }
        let base = self.primary()?;
        if self.eat(&Tok::Caret) {
            let exp = self.factor()?;
            return Ok(Expr::Bin(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Num(v)) => Ok(Expr::Num(v)),
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    let func = Func::lookup(&name)
                        .ok_or_else(|| format!("unknown function `{name}`"))?;
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Tok::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if self.eat(&Tok::RParen) {
                                break;
                            }
                            if !self.eat(&Tok::Comma) {
                                return Err(format!("expected `,` or `)` in `{name}(...)`"));
                            }
                        }
                    }
                    if args.len() != func.arity() {
                        return Err(format!(
                            "`{name}` takes {} argument(s), got {}",
                            func.arity(),
                            args.len()
                        ));
                    }
                    Ok(Expr::Call(func, args))
                } else {
                    match name.as_str() {
                        "pi" => Ok(Expr::Num(std::f64::consts::PI)),
                        "e" => Ok(Expr::Num(std::f64::consts::E)),
                        _ => Ok(Expr::Ident(name)),
                    }
                }
            }
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                if !self.eat(&Tok::RParen) {
                    return Err("missing closing `)`".into());
                }
                Ok(inner)
            }
            Some(tok) => Err(format!("unexpected token `{tok:?}`")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

/// Parse one expression. Errors are plain messages; the model parser wraps
/// them with line and section context.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let toks = tokenize(src)?;
    if toks.is_empty() {
        return Err("empty expression".into());
    }
    let mut p = Parser { toks, pos: 0 };
    let e = p.expr()?;
    if p.pos != p.toks.len() {
        return Err(format!("trailing input after expression in `{src}`"));
    }
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(src: &str, ws: &[Float]) -> Float {
        parse_expr(src).unwrap().eval(ws)
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval_str("2+3*4", &[]), 14.0);
        assert_eq!(eval_str("(2+3)*4", &[]), 20.0);
        assert_eq!(eval_str("2^3^2", &[]), 512.0);
        assert_eq!(eval_str("-2^2", &[]), -4.0);
        assert_eq!(eval_str("6/3/2", &[]), 1.0);
        assert_eq!(eval_str("1 - 2 - 3", &[]), -4.0);
    }

    #[test]
    fn scientific_literals() {
        assert_eq!(eval_str("1.5e-3", &[]), 1.5e-3);
        assert_eq!(eval_str("2E2", &[]), 200.0);
        assert_eq!(eval_str(".5", &[]), 0.5);
    }

    #[test]
    fn functions_and_constants() {
        assert!((eval_str("sin(pi/2)", &[]) - 1.0).abs() < 1e-15);
        assert!((eval_str("log(e)", &[]) - 1.0).abs() < 1e-15);
        assert_eq!(eval_str("max(2, 3)", &[]), 3.0);
        assert_eq!(eval_str("pow(2, 10)", &[]), 1024.0);
        assert_eq!(eval_str("sign(-0.5)", &[]), -1.0);
        assert_eq!(eval_str("sign(0)", &[]), 0.0);
    }

    #[test]
    fn arity_is_checked() {
        assert!(parse_expr("min(1)").is_err());
        assert!(parse_expr("sin(1, 2)").is_err());
        assert!(parse_expr("frobnicate(1)").is_err());
    }

    #[test]
    fn binding_resolves_slots() {
        let mut e = parse_expr("x + 2*y").unwrap();
        e.bind(&|name| match name {
            "x" => Some(0),
            "y" => Some(1),
            _ => None,
        })
        .unwrap();
        assert_eq!(e.eval(&[3.0, 4.0]), 11.0);
    }

    #[test]
    fn binding_reports_the_unknown_name() {
        let mut e = parse_expr("x + qq").unwrap();
        let err = e
            .bind(&|name| if name == "x" { Some(0) } else { None })
            .unwrap_err();
        assert_eq!(err, "qq");
    }

    #[test]
    fn display_round_trips() {
        for src in [
            "x+2*y",
            "(x+1)/(y-2)",
            "-x^2",
            "2^(3^x)",
            "min(a, max(b, c))",
            "1.5e-7*k",
            "a-(b-c)",
            "a/(b*c)",
        ] {
            let e = parse_expr(src).unwrap();
            let rendered = e.to_string();
            let reparsed = parse_expr(&rendered).unwrap();
            assert_eq!(e, reparsed, "{src} -> {rendered}");
        }
    }
}
