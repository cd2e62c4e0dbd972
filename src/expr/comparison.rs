//! # Comparison Semantics
//!
//! Three-valued logic over values:
//!
//! - any comparison with a Null operand yields Null (unknown);
//! - operands of incompatible types are never equal — `=` and the ordering
//!   operators yield False, `!=` yields True;
//! - `IS` is the null-safe equality: `Null IS Null` is True and the result
//!   is always Bool.

use crate::document::Value;
use std::cmp::Ordering;
use std::fmt;

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    /// The operator with its operands swapped: `a ⊗ b` == `b ⊗' a`.
    pub fn flip(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Neq => CmpOp::Neq,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Lte => CmpOp::Gte,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Gte => CmpOp::Lte,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        })
    }
}

/// Applies `op`, returning Bool or Null.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Value {
    if a.is_null() || b.is_null() {
        return Value::Null;
    }

    let result = match a.compare(b) {
        Some(ord) => match op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Neq => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Lte => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Gte => ord != Ordering::Less,
        },
        // incomparable types are simply not equal
        None => op == CmpOp::Neq,
    };
    Value::Bool(result)
}

/// Null-safe equality: always Bool, `Null IS Null` is True.
pub fn is_equal(a: &Value, b: &Value) -> Value {
    match (a.is_null(), b.is_null()) {
        (true, true) => Value::Bool(true),
        (true, false) | (false, true) => Value::Bool(false),
        (false, false) => compare(CmpOp::Eq, a, b),
    }
}
