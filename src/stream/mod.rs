//! # Stream Operators
//!
//! A [`Stream`] is a linear pull pipeline: a source operator followed by
//! transformation operators, usually ending in a projection (reads) or a
//! table sink (writes). Iteration drives a callback per emitted
//! environment; operators chain child environment frames over their input
//! rather than copying documents, so a row flows through the pipeline
//! without materializing until something (Sort, HashAggregate, a sink)
//! needs it to.
//!
//! Early termination (Take) uses the `StreamClosed` sentinel internally;
//! [`Stream::iterate`] converts it to a clean end of iteration, every
//! other error propagates to the caller untouched.
//!
//! The `Display` rendering (`SeqScan("t") | Filter(age > 18) | Project(*)`)
//! is the plan format printed by EXPLAIN.

pub mod aggregate;
pub mod project;
pub mod sink;
pub mod sort;
pub mod source;

use crate::catalog::ValueRange;
use crate::document::{FieldBuffer, Path, Value};
use crate::errors::Error;
use crate::expr::{AggregateFunc, Environment, Expr};
use eyre::{bail, Result};
use std::fmt;

/// One operator of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Source: forward scan of a table in key order.
    SeqScan { table: String },
    /// Source: walk an index within a value range and fetch the
    /// referenced documents.
    IndexScan {
        index: String,
        range: ValueRange,
        reverse: bool,
    },
    /// Source: walk a table within a primary-key range.
    PkScan {
        table: String,
        range: ValueRange,
        reverse: bool,
    },
    /// Source: emit one row per expression; each must evaluate to a
    /// document.
    Expressions { exprs: Vec<Expr> },
    /// Emit rows whose predicate evaluates to a truthy value.
    Filter { expr: Expr },
    /// Replace the current document with a projection mask.
    Project { exprs: Vec<Expr> },
    /// Rename incoming fields positionally.
    IterRename { names: Vec<String> },
    /// Tag each row with its group key.
    GroupBy { expr: Expr },
    /// Consume the input and emit one row per group.
    HashAggregate {
        aggs: Vec<AggregateFunc>,
        /// Field carrying the group key in emitted rows, when grouping.
        group_field: Option<String>,
    },
    /// Materialize the input and emit in path order; Null sorts first
    /// ascending, last descending.
    Sort { path: Path, reverse: bool },
    /// Stop after n rows; n is evaluated once at iteration start.
    Take { n: Expr },
    /// Drop the first n rows.
    Skip { n: Expr },
    /// Write a value at a path of the current document.
    Set { path: Path, expr: Expr },
    /// Remove a path of the current document.
    Unset { path: Path },
    /// Sink: insert each incoming document.
    TableInsert { table: String },
    /// Sink: replace the document at the row's storage key.
    TableReplace { table: String },
    /// Sink: delete the document at the row's storage key.
    TableDelete { table: String },
}

impl Op {
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Op::SeqScan { .. } | Op::IndexScan { .. } | Op::PkScan { .. } | Op::Expressions { .. }
        )
    }
}

/// A pipeline of operators, source first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stream {
    ops: Vec<Op>,
}

impl Stream {
    pub fn new(source: Op) -> Stream {
        Stream { ops: vec![source] }
    }

    /// Appends an operator, builder style.
    pub fn pipe(mut self, op: Op) -> Stream {
        self.ops.push(op);
        self
    }

    pub fn from_ops(ops: Vec<Op>) -> Stream {
        Stream { ops }
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub(crate) fn ops_mut(&mut self) -> &mut Vec<Op> {
        &mut self.ops
    }

    /// Pulls every row through the pipeline, calling `f` once per emitted
    /// environment.
    pub fn iterate(
        &self,
        env: &Environment<'_>,
        f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
    ) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        match self.iter_op(self.ops.len() - 1, env, f) {
            Err(err) if Error::is_stream_closed(&err) => Ok(()),
            other => other,
        }
    }

    fn iter_op(
        &self,
        i: usize,
        env: &Environment<'_>,
        f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
    ) -> Result<()> {
        let op = &self.ops[i];

        if op.is_source() {
            if i != 0 {
                bail!("source operator {} cannot have an input", op);
            }
            return match op {
                Op::SeqScan { table } => source::seq_scan(table, env, f),
                Op::IndexScan {
                    index,
                    range,
                    reverse,
                } => source::index_scan(index, range, *reverse, env, f),
                Op::PkScan {
                    table,
                    range,
                    reverse,
                } => source::pk_scan(table, range, *reverse, env, f),
                Op::Expressions { exprs } => source::expressions(exprs, env, f),
                _ => unreachable!(),
            };
        }

        match op {
            Op::Filter { expr } => self.iter_op(i - 1, env, &mut |e| {
                if expr.eval(e)?.is_truthy() {
                    f(e)
                } else {
                    Ok(())
                }
            }),

            Op::Project { exprs } => {
                // a projection with no input emits exactly one row, which
                // is how SELECT without FROM runs
                if i == 0 {
                    return project::project_one(exprs, env, f);
                }
                self.iter_op(i - 1, env, &mut |e| project::project_one(exprs, e, f))
            }

            Op::IterRename { names } => self.iter_op(i - 1, env, &mut |e| {
                let doc = match e.document() {
                    Some(d) => d,
                    None => bail!("IterRename requires a document"),
                };
                let mut values = Vec::new();
                doc.iterate(&mut |_, v| {
                    values.push(v.clone());
                    Ok(())
                })?;
                if values.len() != names.len() {
                    bail!(
                        "expected {} values, document has {}",
                        names.len(),
                        values.len()
                    );
                }
                let fb: FieldBuffer = names.iter().cloned().zip(values).collect();
                let child = e.child().with_doc(&fb);
                f(&child)
            }),

            Op::GroupBy { expr } => self.iter_op(i - 1, env, &mut |e| {
                let v = expr.eval(e)?;
                let child = e.child().with_group(&v);
                f(&child)
            }),

            Op::HashAggregate { aggs, group_field } => {
                aggregate::iterate(aggs, group_field.as_deref(), self, i, env, f)
            }

            Op::Sort { path, reverse } => sort::iterate(path, *reverse, self, i, env, f),

            Op::Take { n } => {
                let total = count_operand(n, env, "LIMIT")?;
                let mut seen: i64 = 0;
                self.iter_op(i - 1, env, &mut |e| {
                    if seen >= total {
                        return Err(Error::StreamClosed.into());
                    }
                    seen += 1;
                    f(e)
                })
            }

            Op::Skip { n } => {
                let total = count_operand(n, env, "OFFSET")?;
                let mut skipped: i64 = 0;
                self.iter_op(i - 1, env, &mut |e| {
                    if skipped < total {
                        skipped += 1;
                        return Ok(());
                    }
                    f(e)
                })
            }

            Op::Set { path, expr } => self.iter_op(i - 1, env, &mut |e| {
                let doc = match e.document() {
                    Some(d) => d,
                    None => bail!("SET requires a document"),
                };
                let mut fb = FieldBuffer::copy_from(doc)?;
                let v = expr.eval(e)?;
                fb.set(path, v)?;
                let child = e.child().with_doc(&fb);
                f(&child)
            }),

            Op::Unset { path } => self.iter_op(i - 1, env, &mut |e| {
                let doc = match e.document() {
                    Some(d) => d,
                    None => bail!("UNSET requires a document"),
                };
                let mut fb = FieldBuffer::copy_from(doc)?;
                match fb.delete(path) {
                    Ok(()) => {}
                    Err(err)
                        if Error::FieldNotFound.is(&err) || Error::IndexOutOfBounds.is(&err) => {}
                    Err(err) => return Err(err),
                }
                let child = e.child().with_doc(&fb);
                f(&child)
            }),

            Op::TableInsert { table } => sink::insert(table, self, i, env, f),
            Op::TableReplace { table } => sink::replace(table, self, i, env, f),
            Op::TableDelete { table } => sink::delete(table, self, i, env, f),

            _ => unreachable!("source handled above"),
        }
    }

    pub(crate) fn iter_input(
        &self,
        i: usize,
        env: &Environment<'_>,
        f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
    ) -> Result<()> {
        if i == 0 {
            bail!("operator {} requires an input", self.ops[i]);
        }
        self.iter_op(i - 1, env, f)
    }
}

fn count_operand(n: &Expr, env: &Environment<'_>, clause: &str) -> Result<i64> {
    match n.eval(env)? {
        Value::Integer(i) => Ok(i),
        v => bail!("{} expects an integer, got {}", clause, v.type_of()),
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

fn write_exprs(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::SeqScan { table } => write!(f, "SeqScan({:?})", table),
            Op::IndexScan {
                index,
                range,
                reverse,
            } => {
                write!(f, "IndexScan({:?}, {}", index, range)?;
                if *reverse {
                    f.write_str(", reverse")?;
                }
                f.write_str(")")
            }
            Op::PkScan {
                table,
                range,
                reverse,
            } => {
                write!(f, "PkScan({:?}, {}", table, range)?;
                if *reverse {
                    f.write_str(", reverse")?;
                }
                f.write_str(")")
            }
            Op::Expressions { exprs } => {
                f.write_str("Expressions(")?;
                write_exprs(f, exprs)?;
                f.write_str(")")
            }
            Op::Filter { expr } => write!(f, "Filter({})", expr),
            Op::Project { exprs } => {
                f.write_str("Project(")?;
                write_exprs(f, exprs)?;
                f.write_str(")")
            }
            Op::IterRename { names } => write!(f, "IterRename({})", names.join(", ")),
            Op::GroupBy { expr } => write!(f, "GroupBy({})", expr),
            Op::HashAggregate { aggs, .. } => {
                f.write_str("HashAggregate(")?;
                for (i, a) in aggs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                f.write_str(")")
            }
            Op::Sort { path, reverse } => {
                if *reverse {
                    write!(f, "SortReverse({})", path)
                } else {
                    write!(f, "Sort({})", path)
                }
            }
            Op::Take { n } => write!(f, "Take({})", n),
            Op::Skip { n } => write!(f, "Skip({})", n),
            Op::Set { path, expr } => write!(f, "Set({}, {})", path, expr),
            Op::Unset { path } => write!(f, "Unset({})", path),
            Op::TableInsert { table } => write!(f, "TableInsert({:?})", table),
            Op::TableReplace { table } => write!(f, "TableReplace({:?})", table),
            Op::TableDelete { table } => write!(f, "TableDelete({:?})", table),
        }
    }
}
