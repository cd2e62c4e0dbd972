//! # Arithmetic Semantics
//!
//! Numeric operators over Integer and Double. A Null operand propagates
//! Null, as does a non-numeric operand and division by zero. Pure integer
//! operations stay in integer arithmetic (truncating division); an
//! overflowing integer operation promotes to Double.

use crate::document::Value;
use std::fmt;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        })
    }
}

/// Applies `op`. The result is Integer, Double, or Null.
pub fn apply(op: ArithOp, a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => int_op(op, *x, *y),
        (Value::Integer(x), Value::Double(y)) => double_op(op, *x as f64, *y),
        (Value::Double(x), Value::Integer(y)) => double_op(op, *x, *y as f64),
        (Value::Double(x), Value::Double(y)) => double_op(op, *x, *y),
        _ => Value::Null,
    }
}

fn int_op(op: ArithOp, x: i64, y: i64) -> Value {
    let checked = match op {
        ArithOp::Add => x.checked_add(y),
        ArithOp::Sub => x.checked_sub(y),
        ArithOp::Mul => x.checked_mul(y),
        ArithOp::Div => {
            if y == 0 {
                return Value::Null;
            }
            x.checked_div(y)
        }
        ArithOp::Mod => {
            if y == 0 {
                return Value::Null;
            }
            x.checked_rem(y)
        }
    };
    match checked {
        Some(v) => Value::Integer(v),
        None => double_op(op, x as f64, y as f64),
    }
}

fn double_op(op: ArithOp, x: f64, y: f64) -> Value {
    match op {
        ArithOp::Add => Value::Double(x + y),
        ArithOp::Sub => Value::Double(x - y),
        ArithOp::Mul => Value::Double(x * y),
        ArithOp::Div => {
            if y == 0.0 {
                Value::Null
            } else {
                Value::Double(x / y)
            }
        }
        ArithOp::Mod => {
            if y == 0.0 {
                Value::Null
            } else {
                Value::Double(x % y)
            }
        }
    }
}
