//! Condition expressions attached to rules and policy handlers.
//!
//! A condition is evaluated against a JSON context of the shape
//! `{ "principal": { "id", "role" }, "resource": { ...attributes } }`, so rule
//! templates stay independent of the principal they are bound to:
//!
//! ```text
//! resource.student_id == principal.id && resource.status == "draft"
//! ```
//!
//! Supported syntax:
//! - Comparisons: `==`, `!=`, `>`, `<`, `>=`, `<=`
//! - Boolean operators: `&&`, `||`, `!`
//! - Membership: `x in list`
//! - Dot paths: `resource.submission.student_id`
//! - Literals: integers, floats, `"strings"`, `true`, `false`, `null`
//! - Parentheses for grouping
//!
//! Missing paths evaluate to `null`, so a record lacking an ownership field never
//! satisfies an equality against the principal. Type errors (ordering on strings,
//! `&&` on non-booleans) are reported as `AuthzError::InvalidCondition`.

use std::iter::Peekable;
use std::str::CharIndices;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::authz::errors::AuthzError;

/// A parsed condition together with the source text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, AuthzError> {
        Ok(Self {
            source: source.trim().to_string(),
            expr: parse_condition(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, context: &Value) -> Result<bool, AuthzError> {
        evaluate(&self.expr, context).map_err(|e| match e {
            AuthzError::InvalidCondition(msg) => {
                AuthzError::InvalidCondition(format!("{msg} (in `{}`)", self.source))
            }
            other => other,
        })
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

// ─── AST ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LitValue),
    Path(Vec<String>),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    In {
        element: Box<Expr>,
        collection: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LitValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

// ─── Lexer ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,
    Dot,
    LParen,
    RParen,
    Op(BinOp),
    Not,
    In,
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn next_is(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some((_, c)) if *c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    /// Consumes characters while `pred` holds and returns the slice they span.
    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'a str {
        let mut end = self.input.len();
        while let Some(&(i, c)) = self.chars.peek() {
            if !pred(c) {
                end = i;
                break;
            }
            self.chars.next();
        }
        &self.input[start..end]
    }

    fn string(&mut self) -> Result<Token, AuthzError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(Token::Str(out)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => out.push(c),
                    None => break,
                },
                Some((_, c)) => out.push(c),
                None => break,
            }
        }
        Err(AuthzError::InvalidCondition(
            "unterminated string literal".into(),
        ))
    }

    fn number(&mut self, start: usize) -> Result<Token, AuthzError> {
        let text = self.take_while(start, |c| c.is_ascii_digit() || c == '.');
        if text.contains('.') {
            text.parse()
                .map(Token::Float)
                .map_err(|_| AuthzError::InvalidCondition(format!("invalid float `{text}`")))
        } else {
            text.parse()
                .map(Token::Int)
                .map_err(|_| AuthzError::InvalidCondition(format!("invalid integer `{text}`")))
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, AuthzError> {
        let mut tokens = Vec::new();
        while let Some((i, c)) = self.chars.next() {
            let token = match c {
                c if c.is_whitespace() => continue,
                '.' => Token::Dot,
                '(' => Token::LParen,
                ')' => Token::RParen,
                '=' if self.next_is('=') => Token::Op(BinOp::Eq),
                '!' if self.next_is('=') => Token::Op(BinOp::Ne),
                '!' => Token::Not,
                '>' if self.next_is('=') => Token::Op(BinOp::Ge),
                '>' => Token::Op(BinOp::Gt),
                '<' if self.next_is('=') => Token::Op(BinOp::Le),
                '<' => Token::Op(BinOp::Lt),
                '&' if self.next_is('&') => Token::Op(BinOp::And),
                '|' if self.next_is('|') => Token::Op(BinOp::Or),
                '"' => self.string()?,
                c if c.is_ascii_digit() => self.number(i)?,
                c if c.is_ascii_alphabetic() || c == '_' => {
                    match self.take_while(i, |c| c.is_ascii_alphanumeric() || c == '_') {
                        "true" => Token::True,
                        "false" => Token::False,
                        "null" => Token::Null,
                        "in" => Token::In,
                        word => Token::Ident(word.to_string()),
                    }
                }
                c => {
                    return Err(AuthzError::InvalidCondition(format!(
                        "unexpected character `{c}`"
                    )));
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Left-associative chain of `op` over operands produced by `next`.
    fn chain(
        &mut self,
        op: BinOp,
        next: fn(&mut Self) -> Result<Expr, AuthzError>,
    ) -> Result<Expr, AuthzError> {
        let mut left = next(self)?;
        while self.eat(&Token::Op(op)) {
            let right = next(self)?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, AuthzError> {
        self.chain(BinOp::Or, Self::and)
    }

    fn and(&mut self) -> Result<Expr, AuthzError> {
        self.chain(BinOp::And, Self::comparison)
    }

    /// A single, non-associative comparison: `a == b`, `a in b`.
    fn comparison(&mut self) -> Result<Expr, AuthzError> {
        let left = self.unary()?;
        match self.peek() {
            Some(Token::Op(op)) if !matches!(op, BinOp::And | BinOp::Or) => {
                let op = *op;
                self.pos += 1;
                let right = self.unary()?;
                Ok(Expr::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Some(Token::In) => {
                self.pos += 1;
                let collection = self.unary()?;
                Ok(Expr::In {
                    element: Box::new(left),
                    collection: Box::new(collection),
                })
            }
            _ => Ok(left),
        }
    }

    fn unary(&mut self) -> Result<Expr, AuthzError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, AuthzError> {
        let expr = match self.bump() {
            Some(Token::Int(n)) => Expr::Literal(LitValue::Int(n)),
            Some(Token::Float(f)) => Expr::Literal(LitValue::Float(f)),
            Some(Token::Str(s)) => Expr::Literal(LitValue::Str(s)),
            Some(Token::True) => Expr::Literal(LitValue::Bool(true)),
            Some(Token::False) => Expr::Literal(LitValue::Bool(false)),
            Some(Token::Null) => Expr::Literal(LitValue::Null),
            Some(Token::Ident(head)) => {
                let mut path = vec![head];
                while self.eat(&Token::Dot) {
                    match self.bump() {
                        Some(Token::Ident(seg)) => path.push(seg),
                        _ => {
                            return Err(AuthzError::InvalidCondition(
                                "expected identifier after `.`".into(),
                            ));
                        }
                    }
                }
                Expr::Path(path)
            }
            Some(Token::LParen) => {
                let inner = self.or()?;
                if !self.eat(&Token::RParen) {
                    return Err(AuthzError::InvalidCondition(
                        "expected closing parenthesis `)`".into(),
                    ));
                }
                inner
            }
            other => {
                return Err(AuthzError::InvalidCondition(format!(
                    "unexpected token: {other:?}"
                )));
            }
        };
        Ok(expr)
    }
}

/// Parse a condition expression string into an AST.
pub fn parse_condition(input: &str) -> Result<Expr, AuthzError> {
    let tokens = Lexer::new(input).tokenize()?;
    if tokens.is_empty() {
        return Err(AuthzError::InvalidCondition("empty expression".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    if let Some(trailing) = parser.peek() {
        return Err(AuthzError::InvalidCondition(format!(
            "unexpected trailing token: {trailing:?}"
        )));
    }
    Ok(expr)
}

// ─── Evaluator ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Operand>),
    Object(serde_json::Map<String, Value>),
}

impl From<&Value> for Operand {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Operand::Null,
            Value::Object(map) => Operand::Object(map.clone()),
            Value::Bool(b) => Operand::Bool(*b),
            Value::Number(n) => n.as_f64().map(Operand::Number).unwrap_or(Operand::Null),
            Value::String(s) => Operand::Str(s.clone()),
            Value::Array(items) => Operand::List(items.iter().map(Operand::from).collect()),
        }
    }
}

impl From<&LitValue> for Operand {
    fn from(lit: &LitValue) -> Self {
        match lit {
            LitValue::Int(n) => Operand::Number(*n as f64),
            LitValue::Float(f) => Operand::Number(*f),
            LitValue::Str(s) => Operand::Str(s.clone()),
            LitValue::Bool(b) => Operand::Bool(*b),
            LitValue::Null => Operand::Null,
        }
    }
}

/// Evaluate a parsed expression against a JSON context.
pub fn evaluate(expr: &Expr, context: &Value) -> Result<bool, AuthzError> {
    match operand(expr, context)? {
        Operand::Bool(b) => Ok(b),
        other => Err(AuthzError::InvalidCondition(format!(
            "condition must evaluate to boolean, got: {other:?}"
        ))),
    }
}

fn boolean(expr: &Expr, context: &Value, op: &str) -> Result<bool, AuthzError> {
    match operand(expr, context)? {
        Operand::Bool(b) => Ok(b),
        _ => Err(AuthzError::InvalidCondition(format!(
            "`{op}` requires boolean operands"
        ))),
    }
}

fn number(expr: &Expr, context: &Value) -> Result<f64, AuthzError> {
    match operand(expr, context)? {
        Operand::Number(n) => Ok(n),
        _ => Err(AuthzError::InvalidCondition(
            "comparison operator requires numeric operands".into(),
        )),
    }
}

fn operand(expr: &Expr, context: &Value) -> Result<Operand, AuthzError> {
    match expr {
        Expr::Literal(lit) => Ok(Operand::from(lit)),
        Expr::Path(segments) => {
            let found = segments
                .iter()
                .try_fold(context, |current, seg| current.get(seg.as_str()));
            Ok(found.map(Operand::from).unwrap_or(Operand::Null))
        }
        Expr::Not(inner) => Ok(Operand::Bool(!boolean(inner, context, "!")?)),
        Expr::In {
            element,
            collection,
        } => {
            let needle = operand(element, context)?;
            match operand(collection, context)? {
                Operand::List(items) => Ok(Operand::Bool(items.contains(&needle))),
                _ => Err(AuthzError::InvalidCondition(
                    "`in` operator requires an array on the right side".into(),
                )),
            }
        }
        Expr::BinOp { op, left, right } => {
            let result = match op {
                BinOp::And => boolean(left, context, "&&")? && boolean(right, context, "&&")?,
                BinOp::Or => boolean(left, context, "||")? || boolean(right, context, "||")?,
                BinOp::Eq => operand(left, context)? == operand(right, context)?,
                BinOp::Ne => operand(left, context)? != operand(right, context)?,
                BinOp::Gt => number(left, context)? > number(right, context)?,
                BinOp::Lt => number(left, context)? < number(right, context)?,
                BinOp::Ge => number(left, context)? >= number(right, context)?,
                BinOp::Le => number(left, context)? <= number(right, context)?,
            };
            Ok(Operand::Bool(result))
        }
    }
}
