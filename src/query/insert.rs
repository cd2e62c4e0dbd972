//! # INSERT
//!
//! `INSERT INTO t VALUES …` compiles to an Expressions source feeding a
//! TableInsert sink; with a column list, each value row is zipped into a
//! document literal. `INSERT INTO t SELECT …` reuses the query pipeline,
//! renaming fields positionally when a column list is given.

use super::{run_count, select, Output, SelectStmt};
use crate::database::{Param, Transaction};
use crate::expr::Expr;
use crate::stream::{Op, Stream};
use eyre::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// One expression per row; without a column list each must be a
    /// document, with one each must be a value list.
    Values(Vec<Expr>),
    Select(Box<SelectStmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Vec<String>,
    pub source: InsertSource,
}

pub(crate) fn compile(stmt: &InsertStmt) -> Result<Stream> {
    let mut ops = match &stmt.source {
        InsertSource::Values(rows) if stmt.columns.is_empty() => {
            vec![Op::Expressions { exprs: rows.clone() }]
        }
        InsertSource::Values(rows) => {
            let mut docs = Vec::with_capacity(rows.len());
            for row in rows {
                let items = match row {
                    Expr::List(items) => items,
                    other => bail!(
                        "INSERT with a column list expects value lists, got {}",
                        other
                    ),
                };
                if items.len() != stmt.columns.len() {
                    bail!(
                        "{} columns but {} values",
                        stmt.columns.len(),
                        items.len()
                    );
                }
                docs.push(Expr::DocLiteral(
                    stmt.columns
                        .iter()
                        .cloned()
                        .zip(items.iter().cloned())
                        .collect(),
                ));
            }
            vec![Op::Expressions { exprs: docs }]
        }
        InsertSource::Select(sel) => {
            let mut ops = select::compile(sel)?.into_ops();
            if !stmt.columns.is_empty() {
                ops.push(Op::IterRename {
                    names: stmt.columns.clone(),
                });
            }
            ops
        }
    };

    ops.push(Op::TableInsert {
        table: stmt.table.clone(),
    });
    Ok(Stream::from_ops(ops))
}

pub(crate) fn run(tx: &Transaction<'_>, stmt: &InsertStmt, params: &[Param]) -> Result<Output> {
    let stream = compile(stmt)?;
    Ok(Output::Count(run_count(tx, stream, params)?))
}
