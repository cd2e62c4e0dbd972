//! # Planner & Optimizer
//!
//! Rule-based rewriting of operator pipelines, run to a fixed point. No
//! statistics are consulted; the result is deterministic for a given
//! catalog state.
//!
//! | Rule | Transformation |
//! |------|----------------|
//! | constant folding | `Filter(1 + 1 = 2)` → filter removed; `Filter(false)` → empty source |
//! | conjunction splitting | `Filter(a AND b)` → `Filter(a) \| Filter(b)` |
//! | predicate pushdown | `Project(*) \| Filter(f)` → `Filter(f) \| Project(*)` |
//! | primary-key selection | `SeqScan(t) \| Filter(pk ⊗ lit)` → `PkScan(t, range)` |
//! | index selection | `SeqScan(t) \| Filter(path ⊗ lit)` → `IndexScan(i, range)` |
//! | sort elimination | drop `Sort(p)` when the scan already emits in `p` order |
//!
//! Index selection prefers unique indexes, then equality predicates, then
//! catalog order. Every rewrite preserves the multiset of emitted
//! documents.

use crate::catalog::ValueRange;
use crate::database::Transaction;
use crate::document::{Path, Value};
use crate::expr::{CmpOp, Environment, Expr, Function};
use crate::stream::{Op, Stream};
use eyre::Result;
use tracing::debug;

/// Rewrites `stream` against the catalog visible to `tx`.
pub fn optimize(mut stream: Stream, tx: &Transaction<'_>) -> Result<Stream> {
    loop {
        let mut changed = fold_constants(&mut stream)?;
        changed |= split_conjunctions(&mut stream);
        changed |= push_down_filters(&mut stream);
        changed |= select_pk_scan(&mut stream, tx)?;
        changed |= select_index_scan(&mut stream, tx)?;
        changed |= eliminate_sort(&mut stream, tx)?;
        if !changed {
            return Ok(stream);
        }
    }
}

/// Replaces constant sub-expressions with their literal value, removes
/// always-true filters, and collapses always-false filters into an empty
/// source.
fn fold_constants(stream: &mut Stream) -> Result<bool> {
    let mut changed = false;

    for op in stream.ops_mut().iter_mut() {
        match op {
            Op::Filter { expr } | Op::Set { expr, .. } | Op::GroupBy { expr } => {
                changed |= fold_expr(expr)?;
            }
            Op::Take { n } | Op::Skip { n } => {
                changed |= fold_expr(n)?;
            }
            Op::Project { exprs } | Op::Expressions { exprs } => {
                for e in exprs.iter_mut() {
                    changed |= fold_expr(e)?;
                }
            }
            _ => {}
        }
    }

    let ops = stream.ops_mut();
    for i in 0..ops.len() {
        let verdict = match &ops[i] {
            Op::Filter {
                expr: Expr::Literal(v),
            } => Some(v.is_truthy()),
            _ => None,
        };
        match verdict {
            Some(true) => {
                debug!(position = i, "removed always-true filter");
                ops.remove(i);
                return Ok(true);
            }
            Some(false) => {
                debug!(position = i, "collapsed always-false filter into empty source");
                let _: Vec<Op> = ops.splice(0..=i, [Op::Expressions { exprs: vec![] }]).collect();
                return Ok(true);
            }
            None => {}
        }
    }
    Ok(changed)
}

fn fold_expr(e: &mut Expr) -> Result<bool> {
    if matches!(e, Expr::Literal(_)) {
        return Ok(false);
    }
    if e.is_constant() {
        let v = e.eval(&Environment::empty())?;
        *e = Expr::Literal(v);
        return Ok(true);
    }

    let mut changed = false;
    match e {
        Expr::And(l, r)
        | Expr::Or(l, r)
        | Expr::Cmp(_, l, r)
        | Expr::In(l, r)
        | Expr::Is(l, r)
        | Expr::IsNot(l, r)
        | Expr::Arith(_, l, r) => {
            changed |= fold_expr(l)?;
            changed |= fold_expr(r)?;
        }
        Expr::Not(x) | Expr::Neg(x) | Expr::Named(x, _) => changed |= fold_expr(x)?,
        Expr::Function(f) => match f {
            Function::Pk => {}
            Function::TypeOf(x)
            | Function::Len(x)
            | Function::Lower(x)
            | Function::Upper(x)
            | Function::Abs(x) => changed |= fold_expr(x)?,
        },
        Expr::Aggregate(agg) => {
            use crate::expr::AggregateFunc;
            match agg {
                AggregateFunc::Count(None) => {}
                AggregateFunc::Count(Some(x))
                | AggregateFunc::Min(x)
                | AggregateFunc::Max(x)
                | AggregateFunc::Sum(x)
                | AggregateFunc::Avg(x) => changed |= fold_expr(x)?,
            }
        }
        Expr::List(items) => {
            for item in items.iter_mut() {
                changed |= fold_expr(item)?;
            }
        }
        Expr::DocLiteral(fields) => {
            for (_, v) in fields.iter_mut() {
                changed |= fold_expr(v)?;
            }
        }
        _ => {}
    }
    Ok(changed)
}

/// `Filter(a AND b)` → `Filter(a) | Filter(b)`.
fn split_conjunctions(stream: &mut Stream) -> bool {
    let ops = stream.ops_mut();
    for i in 0..ops.len() {
        if let Op::Filter {
            expr: Expr::And(_, _),
        } = &ops[i]
        {
            let (l, r) = match ops.remove(i) {
                Op::Filter {
                    expr: Expr::And(l, r),
                } => (l, r),
                _ => unreachable!(),
            };
            ops.insert(i, Op::Filter { expr: *r });
            ops.insert(i, Op::Filter { expr: *l });
            debug!(position = i, "split filter conjunction");
            return true;
        }
    }
    false
}

/// Moves a filter below a wildcard projection that passes its fields
/// through untouched.
fn push_down_filters(stream: &mut Stream) -> bool {
    let ops = stream.ops_mut();
    for i in 0..ops.len().saturating_sub(1) {
        let passes_through = match (&ops[i], &ops[i + 1]) {
            (Op::Project { exprs }, Op::Filter { expr }) => {
                let has_wildcard = exprs.iter().any(|e| matches!(e, Expr::Wildcard));
                has_wildcard
                    && expr.referenced_fields().iter().all(|field| {
                        !exprs
                            .iter()
                            .any(|e| !matches!(e, Expr::Wildcard) && &e.result_field() == field)
                    })
            }
            _ => false,
        };
        if passes_through {
            ops.swap(i, i + 1);
            debug!(position = i, "pushed filter below projection");
            return true;
        }
    }
    false
}

/// A filter of the shape `path ⊗ literal` (or flipped), for ⊗ other than
/// `!=`.
fn range_candidate(expr: &Expr) -> Option<(Path, CmpOp, Value)> {
    if let Expr::Cmp(op, l, r) = expr {
        if *op == CmpOp::Neq {
            return None;
        }
        match (&**l, &**r) {
            (Expr::Path(p), Expr::Literal(v)) => return Some((p.clone(), *op, v.clone())),
            (Expr::Literal(v), Expr::Path(p)) => return Some((p.clone(), op.flip(), v.clone())),
            _ => {}
        }
    }
    None
}

fn range_from(op: CmpOp, v: Value) -> ValueRange {
    match op {
        CmpOp::Eq => ValueRange::eq(v),
        CmpOp::Lt => ValueRange::lt(v),
        CmpOp::Lte => ValueRange::lte(v),
        CmpOp::Gt => ValueRange::gt(v),
        CmpOp::Gte => ValueRange::gte(v),
        CmpOp::Neq => unreachable!("not a range operator"),
    }
}

/// Positions of the filters sitting directly above the source.
fn chained_filters(ops: &[Op]) -> Vec<usize> {
    ops.iter()
        .enumerate()
        .skip(1)
        .take_while(|(_, op)| matches!(op, Op::Filter { .. }))
        .map(|(i, _)| i)
        .collect()
}

/// `SeqScan(t) | Filter(pk ⊗ lit)` → `PkScan(t, range)`, skipping the
/// index indirection entirely.
fn select_pk_scan(stream: &mut Stream, tx: &Transaction<'_>) -> Result<bool> {
    let table = match stream.ops().first() {
        Some(Op::SeqScan { table }) => table.clone(),
        _ => return Ok(false),
    };

    let pk_path = match tx.table(&table)?.info().primary_key() {
        Some(pk) => pk.path.clone(),
        None => return Ok(false),
    };

    for i in chained_filters(stream.ops()) {
        let expr = match &stream.ops()[i] {
            Op::Filter { expr } => expr,
            _ => unreachable!(),
        };
        if let Some((path, op, v)) = range_candidate(expr) {
            if path == pk_path {
                let ops = stream.ops_mut();
                ops.remove(i);
                ops[0] = Op::PkScan {
                    table: table.clone(),
                    range: range_from(op, v),
                    reverse: false,
                };
                debug!(table = %table, "rewrote filter into primary-key scan");
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// `SeqScan(t) | Filter(path ⊗ lit)` → `IndexScan(i, range)` for an index
/// on `path`. Ties prefer unique indexes, then equality predicates, then
/// catalog order.
fn select_index_scan(stream: &mut Stream, tx: &Transaction<'_>) -> Result<bool> {
    let table = match stream.ops().first() {
        Some(Op::SeqScan { table }) => table.clone(),
        _ => return Ok(false),
    };

    let indexes = tx.list_indexes(&table)?;
    if indexes.is_empty() {
        return Ok(false);
    }

    // (filter position, index, operator, literal), scored below
    let mut candidates = Vec::new();
    for i in chained_filters(stream.ops()) {
        let expr = match &stream.ops()[i] {
            Op::Filter { expr } => expr,
            _ => unreachable!(),
        };
        if let Some((path, op, v)) = range_candidate(expr) {
            for (order, index) in indexes.iter().enumerate() {
                if index.path == path {
                    candidates.push((i, index.name.clone(), index.unique, op, v.clone(), order));
                }
            }
        }
    }

    let best = candidates
        .into_iter()
        .min_by_key(|(_, _, unique, op, _, order)| (!unique, *op != CmpOp::Eq, *order));

    if let Some((i, index, _, op, v, _)) = best {
        let ops = stream.ops_mut();
        ops.remove(i);
        ops[0] = Op::IndexScan {
            index: index.clone(),
            range: range_from(op, v),
            reverse: false,
        };
        debug!(index = %index, "rewrote filter into index scan");
        return Ok(true);
    }
    Ok(false)
}

/// Drops a Sort whose input already arrives in the requested order.
fn eliminate_sort(stream: &mut Stream, tx: &Transaction<'_>) -> Result<bool> {
    let sort_pos = stream
        .ops()
        .iter()
        .position(|op| matches!(op, Op::Sort { .. }));
    let sort_pos = match sort_pos {
        Some(p) if p > 0 => p,
        _ => return Ok(false),
    };

    // every operator between the source and the sort must preserve order
    let order_preserved = stream.ops()[1..sort_pos].iter().all(|op| {
        matches!(
            op,
            Op::Filter { .. }
                | Op::Project { .. }
                | Op::Set { .. }
                | Op::Unset { .. }
                | Op::IterRename { .. }
        )
    });
    if !order_preserved {
        return Ok(false);
    }

    let (sort_path, sort_reverse) = match &stream.ops()[sort_pos] {
        Op::Sort { path, reverse } => (path.clone(), *reverse),
        _ => unreachable!(),
    };

    let scan_order = match &stream.ops()[0] {
        Op::IndexScan { index, .. } => Some(tx.index(index)?.info.path.clone()),
        Op::PkScan { table, .. } | Op::SeqScan { table } => tx
            .table(table)?
            .info()
            .primary_key()
            .map(|pk| pk.path.clone()),
        _ => None,
    };

    if scan_order != Some(sort_path) {
        return Ok(false);
    }

    // a plain table scan has no reverse mode; leave descending sorts alone
    if sort_reverse && matches!(stream.ops()[0], Op::SeqScan { .. }) {
        return Ok(false);
    }

    let ops = stream.ops_mut();
    ops.remove(sort_pos);
    match &mut ops[0] {
        Op::IndexScan { reverse, .. } | Op::PkScan { reverse, .. } => *reverse = sort_reverse,
        _ => {}
    }
    debug!("eliminated sort already satisfied by scan order");
    Ok(true)
}
