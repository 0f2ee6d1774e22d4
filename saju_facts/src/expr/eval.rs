//! Recursive evaluator for [`Expr`].
//!
//! Evaluation is pure: it reads the context and never mutates it.
//!
//! # Missing values
//!
//! - A `var` that does not resolve evaluates to `Value::Missing`.
//! - `Missing` is falsy, equals only `Missing`, and orders against nothing.
//! - Arithmetic with a `Missing` operand yields `Missing`.
//!
//! # Division
//!
//! A denominator closer to zero than [`DIVISION_EPSILON`] is floored to
//! `±DIVISION_EPSILON`, keeping its sign (an exact zero becomes positive).

use std::cmp::Ordering;

use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

use super::{Expr, Op};

/// Smallest magnitude a denominator is allowed to have.
pub const DIVISION_EPSILON: f64 = 1e-9;

impl Expr {
    /// Evaluate this expression against a context.
    pub fn evaluate(&self, ctx: &Context) -> EvalResult<Value> {
        evaluate_expr(self, ctx)
    }
}

/// Evaluate an expression against a context.
pub fn evaluate_expr(expr: &Expr, ctx: &Context) -> EvalResult<Value> {
    match expr {
        Expr::Lit { lit } => Ok(lit.clone()),
        Expr::Var { var } => Ok(ctx.get(var)),
        Expr::Op { op, args } => eval_op(*op, args, ctx),
    }
}

fn eval_op(op: Op, args: &[Expr], ctx: &Context) -> EvalResult<Value> {
    match op {
        Op::And => {
            for arg in args {
                if !evaluate_expr(arg, ctx)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Op::Or => {
            for arg in args {
                if evaluate_expr(arg, ctx)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Op::Not => {
            let [arg] = exact::<1>(op, args)?;
            Ok(Value::Bool(!evaluate_expr(arg, ctx)?.is_truthy()))
        }
        Op::Eq | Op::Ne => {
            let [left, right] = exact::<2>(op, args)?;
            let equal = evaluate_expr(left, ctx)? == evaluate_expr(right, ctx)?;
            Ok(Value::Bool(if op == Op::Eq { equal } else { !equal }))
        }
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            let [left, right] = exact::<2>(op, args)?;
            let ordering = compare(&evaluate_expr(left, ctx)?, &evaluate_expr(right, ctx)?);
            let holds = match (op, ordering) {
                (_, None) => false,
                (Op::Gt, Some(o)) => o == Ordering::Greater,
                (Op::Gte, Some(o)) => o != Ordering::Less,
                (Op::Lt, Some(o)) => o == Ordering::Less,
                (_, Some(o)) => o != Ordering::Greater,
            };
            Ok(Value::Bool(holds))
        }
        Op::In => eval_in(op, args, ctx),
        Op::Add | Op::Mul | Op::Min | Op::Max => {
            if args.is_empty() {
                return Err(arity(op, "at least 1", 0));
            }
            let Some(numbers) = numbers(op, args, ctx)? else {
                return Ok(Value::Missing);
            };
            let result = match op {
                Op::Add => numbers.iter().sum(),
                Op::Mul => numbers.iter().product(),
                Op::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
                _ => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            };
            Ok(Value::Number(result))
        }
        Op::Sub | Op::Div => {
            exact::<2>(op, args)?;
            let Some(numbers) = numbers(op, args, ctx)? else {
                return Ok(Value::Missing);
            };
            let (left, right) = (numbers[0], numbers[1]);
            Ok(Value::Number(if op == Op::Sub {
                left - right
            } else {
                left / floor_denominator(right)
            }))
        }
        Op::If => {
            let [condition, then, otherwise] = exact::<3>(op, args)?;
            if evaluate_expr(condition, ctx)?.is_truthy() {
                evaluate_expr(then, ctx)
            } else {
                evaluate_expr(otherwise, ctx)
            }
        }
    }
}

fn eval_in(op: Op, args: &[Expr], ctx: &Context) -> EvalResult<Value> {
    let Some((needle, candidates)) = args.split_first() else {
        return Err(arity(op, "at least 1", 0));
    };
    let needle = evaluate_expr(needle, ctx)?;
    if needle.is_missing() {
        return Ok(Value::Bool(false));
    }

    // `in(x, list)` tests against the list's items.
    if let [single] = candidates {
        if let Value::List(items) = evaluate_expr(single, ctx)? {
            return Ok(Value::Bool(items.contains(&needle)));
        }
    }

    for candidate in candidates {
        if evaluate_expr(candidate, ctx)? == needle {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// Evaluate every argument as a number. `None` when any is missing.
fn numbers(op: Op, args: &[Expr], ctx: &Context) -> EvalResult<Option<Vec<f64>>> {
    let mut numbers = Vec::with_capacity(args.len());
    let mut missing = false;
    for arg in args {
        match evaluate_expr(arg, ctx)? {
            Value::Number(n) => numbers.push(n),
            Value::Missing => missing = true,
            other => {
                return Err(EvalError::TypeMismatch {
                    op: op.into(),
                    expected: "number",
                    found: other.type_name(),
                })
            }
        }
    }
    Ok(if missing { None } else { Some(numbers) })
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Keep a denominator at least `DIVISION_EPSILON` away from zero.
pub fn floor_denominator(denominator: f64) -> f64 {
    if denominator.abs() >= DIVISION_EPSILON {
        denominator
    } else if denominator < 0.0 {
        -DIVISION_EPSILON
    } else {
        DIVISION_EPSILON
    }
}

fn exact<const N: usize>(op: Op, args: &[Expr]) -> EvalResult<&[Expr; N]> {
    args.try_into().map_err(|_| {
        arity(
            op,
            match N {
                1 => "exactly 1",
                2 => "exactly 2",
                _ => "exactly 3",
            },
            args.len(),
        )
    })
}

fn arity(op: Op, expected: &'static str, found: usize) -> EvalError {
    EvalError::Arity {
        op: op.into(),
        expected,
        found,
    }
}
