//! The expression language used by evaluation keys.
//!
//! An [`Expression`] is parsed once from its source text. It knows which
//! namespace keys it reads, so callers can order evaluations by dependency
//! before evaluating anything.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, CompareOp, Expr, Function, LogicalOp, Segment, UnaryOp, VarRef};
pub use eval::{EvalError, evaluate};
pub use parser::{ParseError, parse};

use crate::value::{Results, Value};
use std::collections::BTreeSet;

/// A parsed expression together with its source and referenced keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    tree: Expr,
    references: BTreeSet<String>,
}

impl Expression {
    /// Parse `source` into an expression.
    ///
    /// # Errors
    /// Returns a `ParseError` if the source is not a valid expression.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let tree = parse(source)?;
        let references = tree.referenced_keys();
        Ok(Self {
            source: source.to_string(),
            tree,
            references,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn tree(&self) -> &Expr {
        &self.tree
    }

    /// Leading keys of every variable reference in the expression.
    #[must_use]
    pub const fn references(&self) -> &BTreeSet<String> {
        &self.references
    }

    /// Evaluate against the given namespace.
    ///
    /// # Errors
    /// Returns an `EvalError` if evaluation fails.
    pub fn evaluate(&self, results: &Results) -> Result<Value, EvalError> {
        evaluate(&self.tree, results)
    }
}
