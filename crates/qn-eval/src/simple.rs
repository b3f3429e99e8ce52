//! `SimpleEvaluator` — a small arithmetic and comparison language.
//!
//! # Grammar
//!
//! ```text
//! expr  := and ( "||" and )*
//! and   := cmp ( "&&" cmp )*
//! cmp   := sum ( ("<" | "<=" | ">" | ">=" | "==" | "=" | "!=") sum )?
//! sum   := prod ( ("+" | "-") prod )*
//! prod  := unary ( ("*" | "/" | "%") unary )*
//! unary := "-" unary | pow
//! pow   := atom ( "^" unary )?
//! atom  := number | name | name "(" expr ("," expr)* ")" | "(" expr ")"
//! ```
//!
//! | Name          | Value                                           |
//! |---------------|-------------------------------------------------|
//! | `w`, `t`, `p` | waiting / transfer / process seconds            |
//! | `now`         | current simulation time in seconds              |
//! | `type`        | client type index (needs a client)              |
//! | `data(i)`     | numeric user data slot `i` (needs a client)     |
//! | `min`, `max`  | two or more arguments                           |
//! | `abs`, `floor`, `ceil`, `round`, `sqrt` | one argument          |
//! | `if(c, a, b)` | `a` when `c != 0`, else `b`                     |
//!
//! Comparisons and logical operators yield `1` or `0`.

use qn_client::Client;

use crate::{EvalError, EvalResult, Evaluator, Expression, Variables};

/// Parses and evaluates expressions on every call.  Stateless, so one
/// instance can be shared by all replications.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleEvaluator;

impl SimpleEvaluator {
    pub fn new() -> Self {
        SimpleEvaluator
    }
}

impl Evaluator for SimpleEvaluator {
    fn evaluate(
        &self,
        expr:   &Expression,
        vars:   &Variables,
        client: Option<&Client>,
    ) -> EvalResult<f64> {
        let node = parse(expr.as_str())?;
        let value = eval(&node, vars, client)?;
        if value.is_finite() { Ok(value) } else { Err(EvalError::NotFinite) }
    }

    fn check(&self, expr: &Expression) -> EvalResult<()> {
        parse(expr.as_str()).map(|_| ())
    }
}

// ── Tokens ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Name(String),
    Op(BinOp),
    Minus,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

fn tokenize(src: &str) -> EvalResult<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let peek = |i: usize| chars.get(i).copied();

    while let Some(c) = peek(i) {
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while peek(i).is_some_and(|c| c.is_ascii_digit() || c == '.') {
                    i += 1;
                }
                if matches!(peek(i), Some('e' | 'E')) {
                    let mut j = i + 1;
                    if matches!(peek(j), Some('+' | '-')) {
                        j += 1;
                    }
                    if peek(j).is_some_and(|c| c.is_ascii_digit()) {
                        while peek(j).is_some_and(|c| c.is_ascii_digit()) {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::Syntax(format!("bad number \"{text}\"")))?;
                out.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while peek(i).is_some_and(|c| c.is_alphanumeric() || c == '_') {
                    i += 1;
                }
                out.push(Token::Name(chars[start..i].iter().collect()));
            }
            _ => {
                let next = peek(i + 1);
                let (token, len) = match (c, next) {
                    ('<', Some('=')) => (Token::Op(BinOp::Le), 2),
                    ('>', Some('=')) => (Token::Op(BinOp::Ge), 2),
                    ('=', Some('=')) => (Token::Op(BinOp::Eq), 2),
                    ('!', Some('=')) => (Token::Op(BinOp::Ne), 2),
                    ('&', Some('&')) => (Token::Op(BinOp::And), 2),
                    ('|', Some('|')) => (Token::Op(BinOp::Or), 2),
                    ('<', _) => (Token::Op(BinOp::Lt), 1),
                    ('>', _) => (Token::Op(BinOp::Gt), 1),
                    ('=', _) => (Token::Op(BinOp::Eq), 1),
                    ('+', _) => (Token::Op(BinOp::Add), 1),
                    ('-', _) => (Token::Minus, 1),
                    ('*', _) => (Token::Op(BinOp::Mul), 1),
                    ('/', _) => (Token::Op(BinOp::Div), 1),
                    ('%', _) => (Token::Op(BinOp::Rem), 1),
                    ('^', _) => (Token::Op(BinOp::Pow), 1),
                    ('(', _) => (Token::LParen, 1),
                    (')', _) => (Token::RParen, 1),
                    (',', _) => (Token::Comma, 1),
                    _ => return Err(EvalError::Syntax(format!("unexpected character '{c}'"))),
                };
                out.push(token);
                i += len;
            }
        }
    }
    Ok(out)
}

// ── Parser ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Var {
    Waiting,
    Transfer,
    Process,
    Now,
    ClientType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Data,
    Min,
    Max,
    Abs,
    Floor,
    Ceil,
    Round,
    Sqrt,
    If,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name.to_ascii_lowercase().as_str() {
            "data"  => Func::Data,
            "min"   => Func::Min,
            "max"   => Func::Max,
            "abs"   => Func::Abs,
            "floor" => Func::Floor,
            "ceil"  => Func::Ceil,
            "round" => Func::Round,
            "sqrt"  => Func::Sqrt,
            "if"    => Func::If,
            _ => return None,
        })
    }

    fn arity_ok(self, n: usize) -> bool {
        match self {
            Func::Min | Func::Max => n >= 2,
            Func::If => n == 3,
            _ => n == 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(Var),
    Call(Func, Vec<Node>),
    Neg(Box<Node>),
    Bin(BinOp, Box<Node>, Box<Node>),
}

struct Parser {
    tokens: Vec<Token>,
    pos:    usize,
}

fn parse(src: &str) -> EvalResult<Node> {
    let mut p = Parser { tokens: tokenize(src)?, pos: 0 };
    if p.tokens.is_empty() {
        return Err(EvalError::Syntax("empty expression".into()));
    }
    let node = p.or()?;
    match p.tokens.get(p.pos) {
        None => Ok(node),
        Some(t) => Err(EvalError::Syntax(format!("unexpected {t:?}"))),
    }
}

impl Parser {
    fn peek_op(&self) -> Option<BinOp> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        ops:  &[BinOp],
        next: fn(&mut Parser) -> EvalResult<Node>,
    ) -> EvalResult<Node> {
        let mut lhs = next(self)?;
        loop {
            let op = match self.peek_op() {
                Some(op) if ops.contains(&op) => op,
                _ => {
                    // `-` is tokenized separately so unary minus stays unambiguous.
                    if ops.contains(&BinOp::Sub) && self.tokens.get(self.pos) == Some(&Token::Minus) {
                        BinOp::Sub
                    } else {
                        return Ok(lhs);
                    }
                }
            };
            self.pos += 1;
            let rhs = next(self)?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn or(&mut self) -> EvalResult<Node> {
        self.binary_level(&[BinOp::Or], Parser::and)
    }

    fn and(&mut self) -> EvalResult<Node> {
        self.binary_level(&[BinOp::And], Parser::cmp)
    }

    fn cmp(&mut self) -> EvalResult<Node> {
        let lhs = self.sum()?;
        match self.peek_op() {
            Some(op @ (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne)) => {
                self.pos += 1;
                let rhs = self.sum()?;
                Ok(Node::Bin(op, Box::new(lhs), Box::new(rhs)))
            }
            _ => Ok(lhs),
        }
    }

    fn sum(&mut self) -> EvalResult<Node> {
        self.binary_level(&[BinOp::Add, BinOp::Sub], Parser::prod)
    }

    fn prod(&mut self) -> EvalResult<Node> {
        self.binary_level(&[BinOp::Mul, BinOp::Div, BinOp::Rem], Parser::unary)
    }

    fn unary(&mut self) -> EvalResult<Node> {
        if self.tokens.get(self.pos) == Some(&Token::Minus) {
            self.pos += 1;
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        self.pow()
    }

    fn pow(&mut self) -> EvalResult<Node> {
        let base = self.atom()?;
        if self.peek_op() == Some(BinOp::Pow) {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(Node::Bin(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn expect(&mut self, token: Token) -> EvalResult<()> {
        if self.tokens.get(self.pos) == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(EvalError::Syntax(format!("expected {token:?}")))
        }
    }

    fn atom(&mut self) -> EvalResult<Node> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| EvalError::Syntax("unexpected end of expression".into()))?;
        self.pos += 1;
        match token {
            Token::Num(v) => Ok(Node::Num(v)),
            Token::LParen => {
                let inner = self.or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Name(name) => {
                if self.tokens.get(self.pos) == Some(&Token::LParen) {
                    self.pos += 1;
                    let func = Func::lookup(&name).ok_or(EvalError::UnknownSymbol(name.clone()))?;
                    let mut args = vec![self.or()?];
                    while self.tokens.get(self.pos) == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.or()?);
                    }
                    self.expect(Token::RParen)?;
                    if !func.arity_ok(args.len()) {
                        return Err(EvalError::Syntax(format!(
                            "{name}() does not take {} argument(s)",
                            args.len()
                        )));
                    }
                    return Ok(Node::Call(func, args));
                }
                let var = match name.to_ascii_lowercase().as_str() {
                    "w" => Var::Waiting,
                    "t" => Var::Transfer,
                    "p" => Var::Process,
                    "now" => Var::Now,
                    "type" => Var::ClientType,
                    _ => return Err(EvalError::UnknownSymbol(name)),
                };
                Ok(Node::Var(var))
            }
            other => Err(EvalError::Syntax(format!("unexpected {other:?}"))),
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────────

#[inline]
fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval(node: &Node, vars: &Variables, client: Option<&Client>) -> EvalResult<f64> {
    Ok(match node {
        Node::Num(v) => *v,
        Node::Var(var) => match var {
            Var::Waiting    => vars.waiting_secs,
            Var::Transfer   => vars.transfer_secs,
            Var::Process    => vars.process_secs,
            Var::Now        => vars.now_secs,
            Var::ClientType => client.ok_or(EvalError::MissingClient)?.client_type.0 as f64,
        },
        Node::Neg(inner) => -eval(inner, vars, client)?,
        Node::Call(func, args) => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval(a, vars, client)?);
            }
            match func {
                Func::Data => {
                    let c = client.ok_or(EvalError::MissingClient)?;
                    let index = values[0].round();
                    if index < 0.0 {
                        return Err(EvalError::Syntax(format!("negative data index {index}")));
                    }
                    c.user_data.number(index as usize)
                }
                Func::Min   => values.iter().copied().fold(f64::INFINITY, f64::min),
                Func::Max   => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                Func::Abs   => values[0].abs(),
                Func::Floor => values[0].floor(),
                Func::Ceil  => values[0].ceil(),
                Func::Round => values[0].round(),
                Func::Sqrt  => values[0].sqrt(),
                Func::If    => if values[0] != 0.0 { values[1] } else { values[2] },
            }
        }
        Node::Bin(op, lhs, rhs) => {
            let a = eval(lhs, vars, client)?;
            let b = eval(rhs, vars, client)?;
            match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div | BinOp::Rem if b == 0.0 => return Err(EvalError::DivisionByZero),
                BinOp::Div => a / b,
                BinOp::Rem => a % b,
                BinOp::Pow => a.powf(b),
                BinOp::Lt  => flag(a < b),
                BinOp::Le  => flag(a <= b),
                BinOp::Gt  => flag(a > b),
                BinOp::Ge  => flag(a >= b),
                BinOp::Eq  => flag(a == b),
                BinOp::Ne  => flag(a != b),
                BinOp::And => flag(a != 0.0 && b != 0.0),
                BinOp::Or  => flag(a != 0.0 || b != 0.0),
            }
        }
    })
}
