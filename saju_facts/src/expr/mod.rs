//! Expression language - a small pure AST evaluated over a fact context.
//!
//! Expressions are plain data. In JSON or TOML they are written as
//! `{ lit = ... }`, `{ var = "a.b" }` or `{ op = "eq", args = [...] }`.

mod eval;

pub use eval::*;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::{FactPath, Value};

/// Operators understood by the evaluator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Op {
    // Logical
    And,
    Or,
    Not,

    // Comparison
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,

    // Membership
    In,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,

    // Conditional
    If,
}

/// An expression node.
///
/// Exactly one of `lit`, `var` or `op` must be present in the data form; any
/// other key, or a mix of them, is rejected with a message saying so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawExpr")]
pub enum Expr {
    /// A literal value.
    Lit { lit: Value },

    /// A reference to a fact in the context.
    Var { var: FactPath },

    /// An operator applied to arguments.
    Op {
        op: Op,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

/// Wire form of [`Expr`], checked field by field before it becomes a node.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExpr {
    #[serde(default, deserialize_with = "present")]
    lit: Option<Value>,
    #[serde(default)]
    var: Option<FactPath>,
    #[serde(default)]
    op: Option<Op>,
    #[serde(default)]
    args: Option<Vec<Expr>>,
}

/// Keeps `lit: null` distinct from an absent `lit`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<RawExpr> for Expr {
    type Error = String;

    fn try_from(raw: RawExpr) -> Result<Self, Self::Error> {
        match (raw.lit, raw.var, raw.op, raw.args) {
            (Some(lit), None, None, None) => Ok(Expr::Lit { lit }),
            (None, Some(var), None, None) => Ok(Expr::Var { var }),
            (None, None, Some(op), args) => Ok(Expr::Op {
                op,
                args: args.unwrap_or_default(),
            }),
            (_, _, None, Some(_)) => Err("'args' is only allowed next to 'op'".to_string()),
            (None, None, None, None) => {
                Err("expression needs one of 'lit', 'var' or 'op'".to_string())
            }
            _ => Err("expression must have only one of 'lit', 'var' or 'op'".to_string()),
        }
    }
}

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Lit { lit: value.into() }
    }

    pub fn var(path: impl Into<FactPath>) -> Self {
        Expr::Var { var: path.into() }
    }

    pub fn op(op: Op, args: Vec<Expr>) -> Self {
        Expr::Op { op, args }
    }

    pub fn and(args: Vec<Expr>) -> Self {
        Self::op(Op::And, args)
    }

    pub fn or(args: Vec<Expr>) -> Self {
        Self::op(Op::Or, args)
    }

    pub fn not(arg: Expr) -> Self {
        Self::op(Op::Not, vec![arg])
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::op(Op::Eq, vec![left, right])
    }

    pub fn ne(left: Expr, right: Expr) -> Self {
        Self::op(Op::Ne, vec![left, right])
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::op(Op::Gt, vec![left, right])
    }

    pub fn gte(left: Expr, right: Expr) -> Self {
        Self::op(Op::Gte, vec![left, right])
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::op(Op::Lt, vec![left, right])
    }

    pub fn lte(left: Expr, right: Expr) -> Self {
        Self::op(Op::Lte, vec![left, right])
    }

    /// Membership test against a list of candidates.
    pub fn is_in(needle: Expr, candidates: Vec<Expr>) -> Self {
        let mut args = Vec::with_capacity(candidates.len() + 1);
        args.push(needle);
        args.extend(candidates);
        Self::op(Op::In, args)
    }

    pub fn add(args: Vec<Expr>) -> Self {
        Self::op(Op::Add, args)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::op(Op::Sub, vec![left, right])
    }

    pub fn mul(args: Vec<Expr>) -> Self {
        Self::op(Op::Mul, args)
    }

    pub fn div(numerator: Expr, denominator: Expr) -> Self {
        Self::op(Op::Div, vec![numerator, denominator])
    }

    pub fn min(args: Vec<Expr>) -> Self {
        Self::op(Op::Min, args)
    }

    pub fn max(args: Vec<Expr>) -> Self {
        Self::op(Op::Max, args)
    }

    pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::op(Op::If, vec![condition, then, otherwise])
    }

    /// Conjoin clauses without adding structure that changes nothing.
    ///
    /// Nested `and`s are flattened. No clauses yields `lit(true)` and a single
    /// clause is returned as-is.
    pub fn all(clauses: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for clause in clauses {
            match clause {
                Expr::Op { op: Op::And, args } => flat.extend(args),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::lit(true),
            1 => flat.remove(0),
            _ => Expr::and(flat),
        }
    }

    /// Every fact path referenced anywhere in this expression.
    pub fn paths(&self) -> BTreeSet<FactPath> {
        let mut paths = BTreeSet::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths(&self, paths: &mut BTreeSet<FactPath>) {
        match self {
            Expr::Lit { .. } => {}
            Expr::Var { var } => {
                paths.insert(var.clone());
            }
            Expr::Op { args, .. } => {
                for arg in args {
                    arg.collect_paths(paths);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit { lit: Value::Text(s) } => write!(f, "{:?}", s),
            Expr::Lit { lit } => write!(f, "{}", lit),
            Expr::Var { var } => write!(f, "{}", var),
            Expr::Op { op, args } => {
                write!(f, "{}(", op)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
