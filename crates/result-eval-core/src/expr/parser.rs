//! Recursive-descent parser for evaluation expressions.
//!
//! Syntax errors carry a position, a context excerpt with a caret under the
//! failing token, and when possible a diagnosis. The diagnosis is found by
//! parsing a table of known-bad expressions and picking the first whose
//! failure looks like the one at hand.

use super::ast::{BinaryOp, CompareOp, Expr, Function, LogicalOp, Segment, UnaryOp, VarRef};
use super::lexer::{Spanned, Token, tokenize};
use crate::value::Value;
use std::fmt;

/// What the parser was looking for when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expected {
    Operand,
    OperatorOrEnd,
    CloseParen,
    ListSeparator,
    ArgSeparator,
    Segment,
    Function,
    Arity,
    Token,
    Shallower,
}

impl Expected {
    const fn describe(self) -> &'static str {
        match self {
            Self::Operand => "a value",
            Self::OperatorOrEnd => "an operator or the end of the expression",
            Self::CloseParen => "')'",
            Self::ListSeparator => "',' or ']'",
            Self::ArgSeparator => "',' or ')'",
            Self::Segment => "a field name, index or '*'",
            Self::Function => "a known function",
            Self::Arity => "a valid argument count",
            Self::Token => "a valid token",
            Self::Shallower => "fewer levels of nesting",
        }
    }
}

/// What the parser found instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Found {
    End,
    Value,
    Operator,
    Minus,
    Not,
    Comparison,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Dot,
    BadChar,
    BadNumber,
    UnterminatedString,
    SingleEquals,
    LogicalSymbol,
    TooDeep,
}

/// Raw parse failure, before diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxFault {
    pub pos: usize,
    pub expected: Expected,
    pub found: Found,
    pub text: String,
    pub at_start: bool,
    pub detail: Option<String>,
}

impl SyntaxFault {
    pub(crate) fn new(pos: usize, expected: Expected, found: Found, text: &str) -> Self {
        Self {
            pos,
            expected,
            found,
            text: text.to_string(),
            at_start: false,
            detail: None,
        }
    }

    /// Failures with equal signatures are considered the same mistake.
    const fn signature(&self) -> (Expected, Found, bool) {
        (self.expected, self.found, self.at_start)
    }

    fn message(&self) -> String {
        if let Some(detail) = &self.detail {
            return detail.clone();
        }
        match self.found {
            Found::BadChar => format!("unexpected character '{}'", self.text),
            Found::BadNumber => format!("invalid number '{}'", self.text),
            Found::UnterminatedString => "unterminated string".to_string(),
            Found::SingleEquals | Found::LogicalSymbol => {
                format!("unexpected '{}'", self.text)
            }
            Found::TooDeep => format!(
                "expression is nested more than {MAX_DEPTH} levels deep"
            ),
            Found::End => format!(
                "unexpected end of expression, expected {}",
                self.expected.describe()
            ),
            _ => format!(
                "unexpected '{}' at position {}, expected {}",
                self.text,
                self.pos,
                self.expected.describe()
            ),
        }
    }

    fn into_error(self, src: &str) -> ParseError {
        ParseError {
            message: self.message(),
            diagnosis: match_examples(&self),
            position: self.pos,
            context: context(src, self.pos),
        }
    }
}

/// An expression that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// Likely cause, when the failure matches a known mistake.
    pub diagnosis: Option<&'static str>,
    /// Byte offset of the offending token.
    pub position: usize,
    /// The surrounding source with a caret under the offending token.
    pub context: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diagnosis {
            Some(diagnosis) => write!(f, "{diagnosis}: {}", self.message),
            None => write!(f, "invalid syntax: {}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Known mistakes, each with expressions that exhibit it.
const BAD_EXAMPLES: &[(&str, &[&str])] = &[
    ("Empty expression", &[""]),
    (
        "Missing value at the end of the expression",
        &["1 +", "a and", "not", "("],
    ),
    (
        "Two operators in a row",
        &["1 + * 2", "a and or b", "1 == == 2"],
    ),
    (
        "Operator is missing its left-hand value",
        &["* 2", "and b", "== 3"],
    ),
    (
        "Comparisons cannot be chained",
        &["a < b < c", "(a < b < c)"],
    ),
    ("Missing operator between values", &["1 2", "(1 2)"]),
    ("Unbalanced closing parenthesis", &["1 + 2)", ")"]),
    ("Unbalanced closing bracket", &["a]", "]"]),
    ("Missing closing parenthesis", &["(1 + 2", "len(a"]),
    (
        "Missing comma between arguments or list items",
        &["len(a b)", "[1 2]"],
    ),
    ("Missing closing bracket", &["[1, 2"]),
    ("Incomplete variable reference", &["a.", "a..b", "a.(b)"]),
    ("Unknown function", &["foo(1)", "1 + foo(2)"]),
    (
        "Wrong number of function arguments",
        &["len(1, 2)", "1 + len()"],
    ),
    ("Unterminated string", &["\"abc"]),
    ("Invalid character", &["a $ b"]),
    ("Use '==' to compare values", &["a = 1"]),
    ("Use 'and' / 'or' instead of '&&' / '||'", &["a && b"]),
    ("Number is malformed or too large", &["99999999999999999999"]),
    ("Expression is nested too deeply", &[TOO_DEEP_EXAMPLE]),
];

/// Sub-expressions, operator chains and function calls nest at most this deep.
pub(crate) const MAX_DEPTH: usize = 64;

/// One level past [`MAX_DEPTH`].
const TOO_DEEP_EXAMPLE: &str = "(((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((1)))))))))))))))))))))))))))))))))))))))))))))))))))))))))))))))))";

fn match_examples(fault: &SyntaxFault) -> Option<&'static str> {
    BAD_EXAMPLES.iter().find_map(|(label, examples)| {
        examples
            .iter()
            .filter_map(|example| parse_tree(example).err())
            .any(|f| f.signature() == fault.signature())
            .then_some(*label)
    })
}

/// Render the source around `pos` with a caret under it.
fn context(src: &str, pos: usize) -> String {
    const SPAN: usize = 40;
    let pos = pos.min(src.len());
    let (head, tail) = src.split_at(pos);

    let head = head.rsplit('\n').next().unwrap_or_default();
    let skip = head.chars().count().saturating_sub(SPAN);
    let before: String = head.chars().skip(skip).collect();
    let after: String = tail
        .split('\n')
        .next()
        .unwrap_or_default()
        .chars()
        .take(SPAN)
        .collect();

    let pad = " ".repeat(before.chars().count());
    format!("{before}{after}\n{pad}^")
}

/// Parse an expression into a syntax tree.
///
/// # Errors
/// Returns a `ParseError` describing the first syntax problem found.
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    parse_tree(src).map_err(|fault| fault.into_error(src))
}

pub(crate) fn parse_tree(src: &str) -> Result<Expr, SyntaxFault> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        index: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    if parser.peek().token != Token::End {
        return Err(parser.fault(Expected::OperatorOrEnd));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
    /// Current nesting, an upper bound on the depth of the tree being built.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Spanned {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    fn peek_token(&self) -> &Token {
        &self.peek().token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek_token().clone();
        if token != Token::End {
            self.index += 1;
        }
        token
    }

    fn fault(&self, expected: Expected) -> SyntaxFault {
        let current = self.peek();
        SyntaxFault {
            at_start: self.index == 0,
            ..SyntaxFault::new(current.pos, expected, current.token.class(), &current.text)
        }
    }

    /// Descend one level, failing once the tree would get too deep to
    /// evaluate or drop without exhausting the stack.
    fn enter(&mut self) -> Result<(), SyntaxFault> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let current = self.peek();
            return Err(SyntaxFault::new(
                current.pos,
                Expected::Shallower,
                Found::TooDeep,
                &current.text,
            ));
        }
        Ok(())
    }

    const fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn expr(&mut self) -> Result<Expr, SyntaxFault> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, SyntaxFault> {
        let mut lhs = self.and()?;
        let mut levels = 0;
        while *self.peek_token() == Token::Or {
            self.advance();
            self.enter()?;
            levels += 1;
            let rhs = self.and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave(levels);
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, SyntaxFault> {
        let mut lhs = self.not()?;
        let mut levels = 0;
        while *self.peek_token() == Token::And {
            self.advance();
            self.enter()?;
            levels += 1;
            let rhs = self.not()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave(levels);
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, SyntaxFault> {
        if *self.peek_token() == Token::Not {
            self.advance();
            self.enter()?;
            let operand = self.not()?;
            self.leave(1);
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, SyntaxFault> {
        let lhs = self.sum()?;
        let op = match self.peek_token() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.sum()?;
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn sum(&mut self) -> Result<Expr, SyntaxFault> {
        let mut lhs = self.product()?;
        let mut levels = 0;
        loop {
            let op = match self.peek_token() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            levels += 1;
            let rhs = self.product()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave(levels);
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr, SyntaxFault> {
        let mut lhs = self.unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek_token() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::SlashSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.enter()?;
            levels += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave(levels);
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxFault> {
        if *self.peek_token() == Token::Minus {
            self.advance();
            self.enter()?;
            let operand = self.unary()?;
            self.leave(1);
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.power()
    }

    /// `^` binds tighter than unary minus on its left and is right-associative.
    fn power(&mut self) -> Result<Expr, SyntaxFault> {
        let base = self.primary()?;
        if *self.peek_token() != Token::Caret {
            return Ok(base);
        }
        self.advance();
        self.enter()?;
        let exponent = self.unary()?;
        self.leave(1);
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            lhs: Box::new(base),
            rhs: Box::new(exponent),
        })
    }

    fn primary(&mut self) -> Result<Expr, SyntaxFault> {
        let literal = match self.peek_token() {
            Token::Int(i) => Value::Int(*i),
            Token::Float(x) => Value::Float(*x),
            Token::Str(s) => Value::Str(s.clone()),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::LParen => {
                self.advance();
                self.enter()?;
                let inner = self.expr()?;
                if *self.peek_token() != Token::RParen {
                    return Err(self.fault(Expected::CloseParen));
                }
                self.advance();
                self.leave(1);
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                let items = self.items(&Token::RBracket, Expected::ListSeparator)?;
                return Ok(Expr::List(items));
            }
            Token::Name(_) => return self.name(),
            _ => return Err(self.fault(Expected::Operand)),
        };
        self.advance();
        Ok(Expr::Literal(literal))
    }

    /// Comma separated expressions up to and including `close`.
    fn items(&mut self, close: &Token, expected: Expected) -> Result<Vec<Expr>, SyntaxFault> {
        let mut items = Vec::new();
        if self.peek_token() == close {
            self.advance();
            return Ok(items);
        }
        self.enter()?;
        loop {
            items.push(self.expr()?);
            match self.peek_token() {
                Token::Comma => {
                    self.advance();
                }
                t if t == close => {
                    self.advance();
                    self.leave(1);
                    return Ok(items);
                }
                _ => return Err(self.fault(expected)),
            }
        }
    }

    fn name(&mut self) -> Result<Expr, SyntaxFault> {
        let name_index = self.index;
        let Token::Name(name) = self.advance() else {
            return Err(self.fault(Expected::Operand));
        };

        if *self.peek_token() == Token::LParen {
            let start = self.tokens[name_index].pos;
            let at_start = name_index == 0;
            let Some(func) = Function::from_name(&name) else {
                return Err(SyntaxFault {
                    at_start,
                    detail: Some(format!("unknown function '{name}'")),
                    ..SyntaxFault::new(start, Expected::Function, Found::Value, &name)
                });
            };
            self.advance();
            let args = self.items(&Token::RParen, Expected::ArgSeparator)?;

            let (min, max) = func.arity();
            if args.len() < min || args.len() > max {
                let wanted = if min == max {
                    min.to_string()
                } else {
                    format!("{min} to {max}")
                };
                return Err(SyntaxFault {
                    at_start,
                    detail: Some(format!(
                        "{name}() takes {wanted} argument(s), got {}",
                        args.len()
                    )),
                    ..SyntaxFault::new(start, Expected::Arity, Found::Value, &name)
                });
            }
            return Ok(Expr::Call { func, args });
        }

        let mut path = Vec::new();
        while *self.peek_token() == Token::Dot {
            self.advance();
            let segment = match self.peek_token() {
                Token::Name(field) => Segment::Field(field.clone()),
                Token::Int(i) => match usize::try_from(*i) {
                    Ok(index) => Segment::Index(index),
                    Err(_) => return Err(self.fault(Expected::Segment)),
                },
                Token::Star => Segment::Wildcard,
                _ => return Err(self.fault(Expected::Segment)),
            };
            self.advance();
            path.push(segment);
        }

        Ok(Expr::Var(VarRef { key: name, path }))
    }
}
