//! # SELECT
//!
//! Compiles a query into the canonical pipeline
//! `source → filter* → group/aggregate → sort → project → skip → take`
//! and drives it. When the projection references aggregates, they move
//! into a HashAggregate operator and the projection is rewritten to read
//! the aggregated fields by name; the group key is referenced the same
//! way.

use super::{collect_aggregates, run_rows, Output};
use crate::database::{Param, Transaction};
use crate::document::Path;
use crate::expr::{Expr, Function};
use crate::stream::{Op, Stream};
use eyre::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub path: Path,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub projection: Vec<Expr>,
    pub from: Option<String>,
    pub filter: Option<Expr>,
    pub group_by: Option<Expr>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl SelectStmt {
    /// A `SELECT * FROM table` skeleton.
    pub fn from_table(table: impl Into<String>) -> SelectStmt {
        SelectStmt {
            projection: vec![Expr::Wildcard],
            from: Some(table.into()),
            filter: None,
            group_by: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    pub fn with_filter(mut self, e: Expr) -> SelectStmt {
        self.filter = Some(e);
        self
    }

    pub fn with_projection(mut self, exprs: Vec<Expr>) -> SelectStmt {
        self.projection = exprs;
        self
    }

    pub(crate) fn has_side_effects(&self) -> bool {
        let mut side_effects = false;
        let mut check = |e: &Expr| {
            e.walk(&mut |node| {
                if matches!(node, Expr::NextValueFor(_)) {
                    side_effects = true;
                }
                !side_effects
            });
        };
        for e in &self.projection {
            check(e);
        }
        for e in [&self.filter, &self.group_by, &self.limit, &self.offset]
            .into_iter()
            .flatten()
        {
            check(e);
        }
        side_effects
    }
}

pub(crate) fn compile(stmt: &SelectStmt) -> Result<Stream> {
    if stmt.projection.is_empty() {
        bail!("SELECT requires at least one projected expression");
    }
    if stmt.from.is_none()
        && (stmt.filter.is_some()
            || stmt.group_by.is_some()
            || stmt.order_by.is_some()
            || !collect_aggregates(&stmt.projection).is_empty())
    {
        bail!("WHERE, GROUP BY, ORDER BY and aggregates require FROM");
    }

    let mut ops = Vec::new();

    if let Some(table) = &stmt.from {
        ops.push(Op::SeqScan {
            table: table.clone(),
        });
    }
    if let Some(filter) = &stmt.filter {
        ops.push(Op::Filter {
            expr: filter.clone(),
        });
    }

    let aggs = collect_aggregates(&stmt.projection);
    let mut projection = stmt.projection.clone();

    if stmt.group_by.is_some() || !aggs.is_empty() {
        if projection.iter().any(|e| matches!(e, Expr::Wildcard)) {
            bail!("wildcard projection cannot be combined with aggregation");
        }

        if let Some(group) = &stmt.group_by {
            ops.push(Op::GroupBy {
                expr: group.clone(),
            });
        }
        ops.push(Op::HashAggregate {
            aggs,
            group_field: stmt.group_by.as_ref().map(|g| g.to_string()),
        });

        projection = projection
            .iter()
            .map(|e| rewrite_aggregated(e, stmt.group_by.as_ref()))
            .collect();
    }

    if let Some(order) = &stmt.order_by {
        ops.push(Op::Sort {
            path: order.path.clone(),
            reverse: order.descending,
        });
    }

    ops.push(Op::Project { exprs: projection });

    if let Some(offset) = &stmt.offset {
        ops.push(Op::Skip { n: offset.clone() });
    }
    if let Some(limit) = &stmt.limit {
        ops.push(Op::Take { n: limit.clone() });
    }

    Ok(Stream::from_ops(ops))
}

/// After aggregation the pipeline carries synthetic documents whose
/// fields are named after the aggregates and the group expression;
/// rewrite the projection to read those fields.
fn rewrite_aggregated(e: &Expr, group: Option<&Expr>) -> Expr {
    if let Some(g) = group {
        if e == g {
            return Expr::Path(Path::field(g.to_string()));
        }
    }
    match e {
        Expr::Aggregate(a) => Expr::Path(Path::field(a.to_string())),
        Expr::Named(inner, alias) => Expr::Named(
            Box::new(rewrite_aggregated(inner, group)),
            alias.clone(),
        ),
        Expr::And(l, r) => Expr::And(
            Box::new(rewrite_aggregated(l, group)),
            Box::new(rewrite_aggregated(r, group)),
        ),
        Expr::Or(l, r) => Expr::Or(
            Box::new(rewrite_aggregated(l, group)),
            Box::new(rewrite_aggregated(r, group)),
        ),
        Expr::Not(x) => Expr::Not(Box::new(rewrite_aggregated(x, group))),
        Expr::Neg(x) => Expr::Neg(Box::new(rewrite_aggregated(x, group))),
        Expr::Cmp(op, l, r) => Expr::Cmp(
            *op,
            Box::new(rewrite_aggregated(l, group)),
            Box::new(rewrite_aggregated(r, group)),
        ),
        Expr::Arith(op, l, r) => Expr::Arith(
            *op,
            Box::new(rewrite_aggregated(l, group)),
            Box::new(rewrite_aggregated(r, group)),
        ),
        Expr::Function(f) => Expr::Function(match f {
            Function::Pk => Function::Pk,
            Function::TypeOf(x) => Function::TypeOf(Box::new(rewrite_aggregated(x, group))),
            Function::Len(x) => Function::Len(Box::new(rewrite_aggregated(x, group))),
            Function::Lower(x) => Function::Lower(Box::new(rewrite_aggregated(x, group))),
            Function::Upper(x) => Function::Upper(Box::new(rewrite_aggregated(x, group))),
            Function::Abs(x) => Function::Abs(Box::new(rewrite_aggregated(x, group))),
        }),
        other => other.clone(),
    }
}

pub(crate) fn run(tx: &Transaction<'_>, stmt: &SelectStmt, params: &[Param]) -> Result<Output> {
    let stream = compile(stmt)?;
    Ok(Output::Rows(run_rows(tx, stream, params)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{AggregateFunc, CmpOp};

    #[test]
    fn select_compiles_to_the_canonical_pipeline() {
        let stmt = SelectStmt {
            projection: vec![Expr::Wildcard],
            from: Some("t".into()),
            filter: Some(Expr::cmp(CmpOp::Gt, Expr::path("a"), Expr::integer(1))),
            group_by: None,
            order_by: Some(OrderBy {
                path: "a".parse().unwrap(),
                descending: false,
            }),
            limit: Some(Expr::integer(10)),
            offset: Some(Expr::integer(5)),
        };
        let stream = compile(&stmt).unwrap();
        let shapes: Vec<&str> = stream
            .ops()
            .iter()
            .map(|op| match op {
                Op::SeqScan { .. } => "scan",
                Op::Filter { .. } => "filter",
                Op::Sort { .. } => "sort",
                Op::Project { .. } => "project",
                Op::Skip { .. } => "skip",
                Op::Take { .. } => "take",
                _ => "other",
            })
            .collect();
        assert_eq!(shapes, vec!["scan", "filter", "sort", "project", "skip", "take"]);
    }

    #[test]
    fn select_without_from_compiles_to_a_bare_projection() {
        let stmt = SelectStmt {
            projection: vec![Expr::named(Expr::integer(1), "one")],
            from: None,
            filter: None,
            group_by: None,
            order_by: None,
            limit: None,
            offset: None,
        };
        let stream = compile(&stmt).unwrap();
        assert_eq!(stream.ops().len(), 1);
        assert!(matches!(stream.ops()[0], Op::Project { .. }));
    }

    #[test]
    fn aggregates_move_into_a_hash_aggregate_operator() {
        let stmt = SelectStmt {
            projection: vec![
                Expr::path("cat"),
                Expr::Aggregate(AggregateFunc::Count(None)),
            ],
            from: Some("t".into()),
            filter: None,
            group_by: Some(Expr::path("cat")),
            order_by: None,
            limit: None,
            offset: None,
        };
        let stream = compile(&stmt).unwrap();
        assert!(stream
            .ops()
            .iter()
            .any(|op| matches!(op, Op::GroupBy { .. })));
        assert!(stream
            .ops()
            .iter()
            .any(|op| matches!(op, Op::HashAggregate { .. })));

        // the projection reads the aggregate output by field name
        let project = stream
            .ops()
            .iter()
            .find_map(|op| match op {
                Op::Project { exprs } => Some(exprs.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(project[1], Expr::Path(Path::field("COUNT(*)")));
    }

    #[test]
    fn wildcard_with_aggregates_is_rejected() {
        let stmt = SelectStmt {
            projection: vec![Expr::Wildcard, Expr::Aggregate(AggregateFunc::Count(None))],
            from: Some("t".into()),
            filter: None,
            group_by: None,
            order_by: None,
            limit: None,
            offset: None,
        };
        assert!(compile(&stmt).is_err());
    }

    #[test]
    fn where_without_from_is_rejected() {
        let stmt = SelectStmt {
            projection: vec![Expr::integer(1)],
            from: None,
            filter: Some(Expr::Literal(crate::document::Value::Bool(true))),
            group_by: None,
            order_by: None,
            limit: None,
            offset: None,
        };
        assert!(compile(&stmt).is_err());
    }

    #[test]
    fn next_value_for_marks_the_select_as_writing() {
        let stmt = SelectStmt {
            projection: vec![Expr::NextValueFor("s".into())],
            from: None,
            filter: None,
            group_by: None,
            order_by: None,
            limit: None,
            offset: None,
        };
        assert!(stmt.has_side_effects());
        assert!(!SelectStmt::from_table("t").has_side_effects());
    }
}
