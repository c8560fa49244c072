//! Syntax tree for evaluation expressions.

use crate::value::Value;
use std::collections::BTreeSet;

/// One step of a variable reference after its leading key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Mapping field: `a.field`.
    Field(String),
    /// List index: `a.0`.
    Index(usize),
    /// Every element of a list or every value of a mapping: `a.*`.
    Wildcard,
}

/// A dotted reference into the results namespace, e.g. `per_file.*.speed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    pub key: String,
    pub path: Vec<Segment>,
}

impl std::fmt::Display for VarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)?;
        for segment in &self.path {
            match segment {
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(i) => write!(f, ".{i}")?,
                Segment::Wildcard => write!(f, ".*")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Built-in functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Len,
    Sum,
    Avg,
    Min,
    Max,
    All,
    Any,
    Abs,
    Int,
    Float,
    Round,
}

impl Function {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "sum" => Self::Sum,
            "avg" => Self::Avg,
            "min" => Self::Min,
            "max" => Self::Max,
            "all" => Self::All,
            "any" => Self::Any,
            "abs" => Self::Abs,
            "int" => Self::Int,
            "float" => Self::Float,
            "round" => Self::Round,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::All => "all",
            Self::Any => "any",
            Self::Abs => "abs",
            Self::Int => "int",
            Self::Float => "float",
            Self::Round => "round",
        }
    }

    /// Accepted argument counts, inclusive.
    #[must_use]
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Self::Round => (1, 2),
            _ => (1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(VarRef),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Namespace keys this expression reads: the leading key of every
    /// variable reference.
    #[must_use]
    pub fn referenced_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, keys: &mut BTreeSet<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Var(var) => {
                keys.insert(var.key.clone());
            }
            Self::List(items) | Self::Call { args: items, .. } => {
                for item in items {
                    item.collect_keys(keys);
                }
            }
            Self::Unary { operand, .. } => operand.collect_keys(keys),
            Self::Binary { lhs, rhs, .. }
            | Self::Compare { lhs, rhs, .. }
            | Self::Logical { lhs, rhs, .. } => {
                lhs.collect_keys(keys);
                rhs.collect_keys(keys);
            }
        }
    }
}
