//! # Expressions
//!
//! The expression tree evaluated against an [`Environment`]. The external
//! SQL parser produces these nodes; the planner matches on their structure
//! (derived `PartialEq` gives structural equality); the operators evaluate
//! them row by row.
//!
//! Evaluation is pure except for `NEXT VALUE FOR`, which advances a
//! sequence through the environment's transaction.

pub mod arithmetic;
pub mod comparison;
pub mod env;
pub mod functions;

pub use arithmetic::ArithOp;
pub use comparison::CmpOp;
pub use env::Environment;
pub use functions::Function;

use crate::document::{FieldBuffer, Path, Value, ValueBuffer};
use crate::errors::Error;
use eyre::{bail, Result};
use std::fmt;

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Field selector over the current document; missing fields read as
    /// Null.
    Path(Path),
    /// Only valid inside a projection.
    Wildcard,
    /// 1-based positional parameter.
    PositionalParam(usize),
    NamedParam(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),
    Is(Box<Expr>, Box<Expr>),
    IsNot(Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Function(Function),
    /// Only valid inside a projection; the planner moves these into a
    /// HashAggregate operator.
    Aggregate(AggregateFunc),
    NextValueFor(String),
    List(Vec<Expr>),
    DocLiteral(Vec<(String, Expr)>),
    /// An aliased projection expression.
    Named(Box<Expr>, String),
}

/// An aggregate function reference inside a projection.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateFunc {
    /// `COUNT(*)` when the argument is `None`, `COUNT(expr)` otherwise
    /// (counting non-null values).
    Count(Option<Box<Expr>>),
    Min(Box<Expr>),
    Max(Box<Expr>),
    Sum(Box<Expr>),
    Avg(Box<Expr>),
}

impl AggregateFunc {
    pub fn arg(&self) -> Option<&Expr> {
        match self {
            AggregateFunc::Count(arg) => arg.as_deref(),
            AggregateFunc::Min(e)
            | AggregateFunc::Max(e)
            | AggregateFunc::Sum(e)
            | AggregateFunc::Avg(e) => Some(e),
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunc::Count(None) => write!(f, "COUNT(*)"),
            AggregateFunc::Count(Some(e)) => write!(f, "COUNT({})", e),
            AggregateFunc::Min(e) => write!(f, "MIN({})", e),
            AggregateFunc::Max(e) => write!(f, "MAX({})", e),
            AggregateFunc::Sum(e) => write!(f, "SUM({})", e),
            AggregateFunc::Avg(e) => write!(f, "AVG({})", e),
        }
    }
}

impl Expr {
    pub fn integer(i: i64) -> Expr {
        Expr::Literal(Value::Integer(i))
    }

    pub fn text(s: impl Into<String>) -> Expr {
        Expr::Literal(Value::Text(s.into()))
    }

    /// Parses a dot/bracket path into a path expression.
    pub fn path(s: &str) -> Expr {
        Expr::Path(s.parse().expect("valid path literal"))
    }

    pub fn cmp(op: CmpOp, l: Expr, r: Expr) -> Expr {
        Expr::Cmp(op, Box::new(l), Box::new(r))
    }

    pub fn and(l: Expr, r: Expr) -> Expr {
        Expr::And(Box::new(l), Box::new(r))
    }

    pub fn or(l: Expr, r: Expr) -> Expr {
        Expr::Or(Box::new(l), Box::new(r))
    }

    pub fn named(e: Expr, alias: impl Into<String>) -> Expr {
        Expr::Named(Box::new(e), alias.into())
    }

    /// Evaluates to a value. `Wildcard` and `Aggregate` are positional
    /// constructs handled by the operators and cannot be evaluated
    /// directly.
    pub fn eval(&self, env: &Environment<'_>) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),

            Expr::Path(p) => match env.document() {
                Some(d) => match p.get_from(d) {
                    Ok(v) => Ok(v),
                    Err(err)
                        if Error::FieldNotFound.is(&err)
                            || Error::IndexOutOfBounds.is(&err) =>
                    {
                        Ok(Value::Null)
                    }
                    Err(err) => Err(err),
                },
                None => Ok(Value::Null),
            },

            Expr::Wildcard => bail!("wildcard is only valid in a projection"),

            Expr::PositionalParam(n) => env
                .positional_param(*n)
                .cloned()
                .ok_or_else(|| eyre::eyre!("no value bound for parameter ${}", n)),

            Expr::NamedParam(name) => env
                .named_param(name)
                .cloned()
                .ok_or_else(|| eyre::eyre!("no value bound for parameter ${}", name)),

            Expr::And(l, r) => {
                let a = bool3(l.eval(env)?);
                if a == Some(false) {
                    return Ok(Value::Bool(false));
                }
                match (a, bool3(r.eval(env)?)) {
                    (_, Some(false)) => Ok(Value::Bool(false)),
                    (Some(true), Some(true)) => Ok(Value::Bool(true)),
                    _ => Ok(Value::Null),
                }
            }

            Expr::Or(l, r) => {
                let a = bool3(l.eval(env)?);
                if a == Some(true) {
                    return Ok(Value::Bool(true));
                }
                match (a, bool3(r.eval(env)?)) {
                    (_, Some(true)) => Ok(Value::Bool(true)),
                    (Some(false), Some(false)) => Ok(Value::Bool(false)),
                    _ => Ok(Value::Null),
                }
            }

            Expr::Not(e) => Ok(match bool3(e.eval(env)?) {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            }),

            Expr::Cmp(op, l, r) => Ok(comparison::compare(*op, &l.eval(env)?, &r.eval(env)?)),

            Expr::In(l, r) => {
                let needle = l.eval(env)?;
                if needle.is_null() {
                    return Ok(Value::Null);
                }
                match r.eval(env)? {
                    Value::Array(items) => {
                        let mut saw_null = false;
                        for item in items.iter() {
                            match comparison::compare(CmpOp::Eq, &needle, item) {
                                Value::Bool(true) => return Ok(Value::Bool(true)),
                                Value::Null => saw_null = true,
                                _ => {}
                            }
                        }
                        Ok(if saw_null { Value::Null } else { Value::Bool(false) })
                    }
                    Value::Null => Ok(Value::Null),
                    _ => Ok(Value::Bool(false)),
                }
            }

            Expr::Is(l, r) => Ok(comparison::is_equal(&l.eval(env)?, &r.eval(env)?)),

            Expr::IsNot(l, r) => Ok(match comparison::is_equal(&l.eval(env)?, &r.eval(env)?) {
                Value::Bool(b) => Value::Bool(!b),
                v => v,
            }),

            Expr::Arith(op, l, r) => Ok(arithmetic::apply(*op, &l.eval(env)?, &r.eval(env)?)),

            Expr::Neg(e) => match e.eval(env)? {
                Value::Integer(i) => Ok(i
                    .checked_neg()
                    .map(Value::Integer)
                    .unwrap_or(Value::Double(-(i as f64)))),
                Value::Double(d) => Ok(Value::Double(-d)),
                Value::Null => Ok(Value::Null),
                v => bail!("cannot negate a {}", v.type_of()),
            },

            Expr::Function(f) => f.eval(env),

            Expr::Aggregate(agg) => {
                bail!("aggregate {} is only valid in a projection", agg)
            }

            Expr::NextValueFor(name) => match env.tx() {
                Some(tx) => Ok(Value::Integer(tx.sequence_next(name)?)),
                None => bail!("NEXT VALUE FOR cannot be evaluated outside a transaction"),
            },

            Expr::List(items) => {
                let mut vb = ValueBuffer::new();
                for item in items {
                    vb.append(item.eval(env)?);
                }
                Ok(Value::Array(vb))
            }

            Expr::DocLiteral(fields) => {
                let mut fb = FieldBuffer::new();
                for (name, e) in fields {
                    fb.push(name.clone(), e.eval(env)?);
                }
                Ok(Value::Document(fb))
            }

            Expr::Named(e, _) => e.eval(env),
        }
    }

    /// Pre-order traversal; returning false from `f` prunes the subtree.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr) -> bool) -> bool {
        if !f(self) {
            return false;
        }
        match self {
            Expr::Literal(_)
            | Expr::Path(_)
            | Expr::Wildcard
            | Expr::PositionalParam(_)
            | Expr::NamedParam(_)
            | Expr::NextValueFor(_) => true,
            Expr::And(l, r)
            | Expr::Or(l, r)
            | Expr::Cmp(_, l, r)
            | Expr::In(l, r)
            | Expr::Is(l, r)
            | Expr::IsNot(l, r)
            | Expr::Arith(_, l, r) => l.walk(f) && r.walk(f),
            Expr::Not(e) | Expr::Neg(e) | Expr::Named(e, _) => e.walk(f),
            Expr::Function(func) => match func.args() {
                Some(e) => e.walk(f),
                None => true,
            },
            Expr::Aggregate(agg) => match agg.arg() {
                Some(e) => e.walk(f),
                None => true,
            },
            Expr::List(items) => items.iter().all(|e| e.walk(f)),
            Expr::DocLiteral(fields) => fields.iter().all(|(_, e)| e.walk(f)),
        }
    }

    /// Whether the expression has no free variables and no side effects,
    /// so the optimizer may fold it to its literal value.
    pub fn is_constant(&self) -> bool {
        let mut constant = true;
        self.walk(&mut |e| {
            match e {
                Expr::Path(_)
                | Expr::Wildcard
                | Expr::PositionalParam(_)
                | Expr::NamedParam(_)
                | Expr::NextValueFor(_)
                | Expr::Aggregate(_)
                | Expr::Function(Function::Pk) => constant = false,
                _ => {}
            }
            constant
        });
        constant
    }

    /// Top-level field names this expression reads from the current
    /// document.
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Path(p) = e {
                if let Some(crate::document::PathFragment::Field(name)) = p.fragments().first() {
                    if !fields.iter().any(|f| f == name) {
                        fields.push(name.clone());
                    }
                }
            }
            true
        });
        fields
    }

    /// Field name this expression projects to: the alias when named,
    /// otherwise its rendering.
    pub fn result_field(&self) -> String {
        match self {
            Expr::Named(_, alias) => alias.clone(),
            other => other.to_string(),
        }
    }
}

fn bool3(v: Value) -> Option<bool> {
    match v {
        Value::Null => None,
        v => Some(v.is_truthy()),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Path(p) => write!(f, "{}", p),
            Expr::Wildcard => write!(f, "*"),
            Expr::PositionalParam(n) => write!(f, "${}", n),
            Expr::NamedParam(name) => write!(f, "${}", name),
            Expr::And(l, r) => write!(f, "{} AND {}", l, r),
            Expr::Or(l, r) => write!(f, "{} OR {}", l, r),
            Expr::Not(e) => write!(f, "NOT {}", e),
            Expr::Cmp(op, l, r) => write!(f, "{} {} {}", l, op, r),
            Expr::In(l, r) => write!(f, "{} IN {}", l, r),
            Expr::Is(l, r) => write!(f, "{} IS {}", l, r),
            Expr::IsNot(l, r) => write!(f, "{} IS NOT {}", l, r),
            Expr::Arith(op, l, r) => write!(f, "{} {} {}", l, op, r),
            Expr::Neg(e) => write!(f, "-{}", e),
            Expr::Function(func) => write!(f, "{}", func),
            Expr::Aggregate(agg) => write!(f, "{}", agg),
            Expr::NextValueFor(name) => write!(f, "NEXT VALUE FOR {}", name),
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, e) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            Expr::DocLiteral(fields) => {
                write!(f, "{{")?;
                for (i, (name, e)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, e)?;
                }
                write!(f, "}}")
            }
            Expr::Named(e, _) => write!(f, "{}", e),
        }
    }
}
