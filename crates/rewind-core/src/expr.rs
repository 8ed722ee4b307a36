//! Predicate expressions over reconstructed documents.
//!
//! A small expression language used by [`crate::filter`] to keep only the
//! node states a caller is interested in.
//!
//! # Syntax
//!
//! ```text
//! total                 // top-level field of the document (missing => null)
//! customer.name         // nested field
//! tags[0], doc["a-b"]   // array index / key lookup
//! `odd-name`            // quoted field name
//!
//! 1, 2.5, "s", 's'      // literals
//! true, false, null
//! [1, 2, "x"]           // list
//!
//! // Operators (precedence low to high)
//! a || b, a or b
//! a && b, a and b
//! !a, not a
//! a == b, a != b, a < b, a <= b, a > b, a >= b
//! a in [..], a not in [..]
//! a =~ "regex"
//! a + b, a - b
//! a * b, a / b, a % b
//! -a
//! ```
//!
//! Values compare across types in the order null < bool < number < string <
//! array < object. `null`, `false`, `0` and `""` are falsy; everything else,
//! including empty arrays and objects, is truthy. Arithmetic on non-numbers
//! and division by zero yield `null`.

use regex::Regex;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Expression parse error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected {found} at offset {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// A backtick-quoted name; never a keyword.
    Quoted(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Tilde,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Ident(name) | Self::Quoted(name) => write!(f, "'{name}'"),
            Self::Eof => f.write_str("end of expression"),
            other => write!(f, "'{}'", other.symbol()),
        }
    }
}

impl Token {
    const fn symbol(&self) -> &'static str {
        match self {
            Self::Dot => ".",
            Self::Comma => ",",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Tilde => "=~",
            Self::Number(_)
            | Self::Str(_)
            | Self::Ident(_)
            | Self::Quoted(_)
            | Self::Eof => "",
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume `next` if it is the upcoming character.
    fn eat(&mut self, next: char) -> bool {
        if self.peek_char() == Some(next) {
            self.pos += next.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.next_char();
        }
    }

    fn read_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self.peek_char().is_some_and(&keep) {
            self.next_char();
        }
        &input[start..self.pos]
    }

    fn read_number(&mut self) -> Result<f64, ExprError> {
        let text = self.read_while(|c| c.is_ascii_digit() || c == '.');
        text.parse()
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))
    }

    fn read_delimited(&mut self, quote: char, start: usize) -> Result<String, ExprError> {
        let mut out = String::new();
        loop {
            match self.next_char() {
                None => return Err(ExprError::UnterminatedString(start)),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.next_char() {
                    None => return Err(ExprError::UnterminatedString(start)),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Next token and the offset it starts at.
    fn next_token(&mut self) -> Result<(Token, usize), ExprError> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.next_char() else {
            return Ok((Token::Eof, start));
        };

        let token = match c {
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' if self.eat('=') => Token::NotEq,
            '!' => Token::Bang,
            '<' if self.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '=' if self.eat('=') => Token::EqEq,
            '=' if self.eat('~') => Token::Tilde,
            '&' if self.eat('&') => Token::AndAnd,
            '|' if self.eat('|') => Token::OrOr,
            '"' | '\'' => Token::Str(self.read_delimited(c, start)?),
            '`' => Token::Quoted(self.read_delimited('`', start)?),
            '0'..='9' => {
                self.pos = start;
                Token::Number(self.read_number()?)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                self.pos = start;
                let name = self.read_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                Token::Ident(name.to_string())
            }
            ch => return Err(ExprError::UnexpectedChar { ch, pos: start }),
        };
        Ok((token, start))
    }
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone)]
enum Ast {
    Literal(Value),
    Field(String),
    Member(Box<Ast>, String),
    Index(Box<Ast>, Box<Ast>),
    List(Vec<Ast>),
    Not(Box<Ast>),
    Neg(Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
    Matches(Box<Ast>, Regex),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ExprError> {
        let mut lexer = Lexer::new(input);
        let (current, pos) = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            pos,
        })
    }

    fn advance(&mut self) -> Result<(), ExprError> {
        (self.current, self.pos) = self.lexer.next_token()?;
        Ok(())
    }

    fn unexpected(&self) -> ExprError {
        if self.current == Token::Eof {
            ExprError::UnexpectedEnd
        } else {
            ExprError::UnexpectedToken {
                found: self.current.to_string(),
                pos: self.pos,
            }
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        if &self.current == expected {
            self.advance()
        } else {
            Err(self.unexpected())
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current, Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }

    fn parse(mut self) -> Result<Ast, ExprError> {
        let ast = self.parse_or()?;
        if self.current == Token::Eof {
            Ok(ast)
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_or(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_and()?;
        while self.current == Token::OrOr || self.at_keyword("or") {
            self.advance()?;
            let right = self.parse_and()?;
            left = Ast::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_not()?;
        while self.current == Token::AndAnd || self.at_keyword("and") {
            self.advance()?;
            let right = self.parse_not()?;
            left = Ast::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Ast, ExprError> {
        if self.current == Token::Bang || self.at_keyword("not") {
            self.advance()?;
            return Ok(Ast::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Ast, ExprError> {
        let left = self.parse_sum()?;

        let op = match &self.current {
            Token::EqEq => BinOp::Eq,
            Token::NotEq => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::Tilde => {
                self.advance()?;
                return self.parse_regex(left);
            }
            _ if self.at_keyword("in") => BinOp::In,
            _ if self.at_keyword("not") => {
                self.advance()?;
                if !self.at_keyword("in") {
                    return Err(self.unexpected());
                }
                BinOp::NotIn
            }
            _ => return Ok(left),
        };
        self.advance()?;
        let right = self.parse_sum()?;
        Ok(Ast::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_regex(&mut self, subject: Ast) -> Result<Ast, ExprError> {
        let Token::Str(pattern) = &self.current else {
            return Err(self.unexpected());
        };
        let regex = Regex::new(pattern).map_err(|err| ExprError::InvalidRegex {
            pattern: pattern.clone(),
            reason: err.to_string(),
        })?;
        self.advance()?;
        Ok(Ast::Matches(Box::new(subject), regex))
    }

    fn parse_sum(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.current {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.parse_product()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_product(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Ast, ExprError> {
        if self.current == Token::Minus {
            self.advance()?;
            return Ok(Ast::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Ast, ExprError> {
        let mut base = self.parse_primary()?;
        loop {
            match &self.current {
                Token::Dot => {
                    self.advance()?;
                    let name = match &self.current {
                        Token::Ident(name) | Token::Quoted(name) => name.clone(),
                        _ => return Err(self.unexpected()),
                    };
                    self.advance()?;
                    base = Ast::Member(Box::new(base), name);
                }
                Token::LBracket => {
                    self.advance()?;
                    let index = self.parse_or()?;
                    self.expect(&Token::RBracket)?;
                    base = Ast::Index(Box::new(base), Box::new(index));
                }
                _ => return Ok(base),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Ast, ExprError> {
        let ast = match &self.current {
            Token::Number(n) => {
                Ast::Literal(Number::from_f64(*n).map_or(Value::Null, Value::Number))
            }
            Token::Str(s) => Ast::Literal(Value::String(s.clone())),
            Token::Quoted(name) => Ast::Field(name.clone()),
            Token::Ident(name) => match name.to_ascii_lowercase().as_str() {
                "true" => Ast::Literal(Value::Bool(true)),
                "false" => Ast::Literal(Value::Bool(false)),
                "null" => Ast::Literal(Value::Null),
                "and" | "or" | "not" | "in" => return Err(self.unexpected()),
                _ => Ast::Field(name.clone()),
            },
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance()?;
                let mut items = Vec::new();
                if self.current != Token::RBracket {
                    items.push(self.parse_or()?);
                    while self.current == Token::Comma {
                        self.advance()?;
                        items.push(self.parse_or()?);
                    }
                }
                self.expect(&Token::RBracket)?;
                return Ok(Ast::List(items));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(ast)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values used by the comparison operators.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| compare_values(x, y))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => {
            let mut x_keys: Vec<&String> = x.keys().collect();
            let mut y_keys: Vec<&String> = y.keys().collect();
            x_keys.sort();
            y_keys.sort();
            x_keys.cmp(&y_keys).then_with(|| {
                x_keys
                    .iter()
                    .map(|key| compare_values(&x[key.as_str()], &y[key.as_str()]))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Truthiness used by the logical operators and by [`Predicate::matches`].
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn number(n: f64) -> Value {
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Value {
    let (Some(x), Some(y)) = (left.as_f64(), right.as_f64()) else {
        return Value::Null;
    };
    match op {
        BinOp::Add => number(x + y),
        BinOp::Sub => number(x - y),
        BinOp::Mul => number(x * y),
        BinOp::Div if y != 0.0 => number(x / y),
        BinOp::Rem if y != 0.0 => number(x % y),
        _ => Value::Null,
    }
}

fn contains(list: &Value, needle: &Value) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|item| compare_values(item, needle).is_eq()))
}

impl Ast {
    fn eval(&self, doc: &Value) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Field(name) => doc.get(name).cloned().unwrap_or(Value::Null),
            Self::Member(base, name) => base.eval(doc).get(name).cloned().unwrap_or(Value::Null),
            Self::Index(base, index) => {
                let base = base.eval(doc);
                let found = match index.eval(doc) {
                    Value::Number(n) => n
                        .as_u64()
                        .and_then(|i| usize::try_from(i).ok())
                        .and_then(|i| base.get(i)),
                    Value::String(key) => base.get(key.as_str()),
                    _ => None,
                };
                found.cloned().unwrap_or(Value::Null)
            }
            Self::List(items) => Value::Array(items.iter().map(|item| item.eval(doc)).collect()),
            Self::Not(inner) => Value::Bool(!truthy(&inner.eval(doc))),
            Self::Neg(inner) => inner.eval(doc).as_f64().map_or(Value::Null, |n| number(-n)),
            Self::Matches(subject, regex) => {
                Value::Bool(subject.eval(doc).as_str().is_some_and(|s| regex.is_match(s)))
            }
            Self::Binary(BinOp::And, left, right) => {
                Value::Bool(truthy(&left.eval(doc)) && truthy(&right.eval(doc)))
            }
            Self::Binary(BinOp::Or, left, right) => {
                Value::Bool(truthy(&left.eval(doc)) || truthy(&right.eval(doc)))
            }
            Self::Binary(op, left, right) => {
                let (left, right) = (left.eval(doc), right.eval(doc));
                let ord = || compare_values(&left, &right);
                match op {
                    BinOp::Eq => Value::Bool(ord().is_eq()),
                    BinOp::Ne => Value::Bool(ord().is_ne()),
                    BinOp::Lt => Value::Bool(ord().is_lt()),
                    BinOp::Le => Value::Bool(ord().is_le()),
                    BinOp::Gt => Value::Bool(ord().is_gt()),
                    BinOp::Ge => Value::Bool(ord().is_ge()),
                    BinOp::In => Value::Bool(contains(&right, &left)),
                    BinOp::NotIn => Value::Bool(!contains(&right, &left)),
                    _ => arithmetic(*op, &left, &right),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// A parsed predicate, ready to test documents.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    ast: Ast,
}

impl Predicate {
    /// Parse `source` into a predicate.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] describing the first syntax problem found.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let ast = Parser::new(source)?.parse()?;
        Ok(Self {
            source: source.trim().to_string(),
            ast,
        })
    }

    /// The expression text this predicate was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the expression against `doc`.
    #[must_use]
    pub fn eval(&self, doc: &Value) -> Value {
        self.ast.eval(doc)
    }

    /// Whether `doc` satisfies the predicate.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        truthy(&self.eval(doc))
    }
}

impl FromStr for Predicate {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
