//! # DELETE
//!
//! `DELETE FROM t [WHERE …]` compiles to a scan feeding a TableDelete
//! sink; the sink deletes by the storage key each row carries from the
//! scan.

use super::{run_count, Output};
use crate::database::{Param, Transaction};
use crate::expr::Expr;
use crate::stream::{Op, Stream};
use eyre::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    pub filter: Option<Expr>,
}

pub(crate) fn compile(stmt: &DeleteStmt) -> Result<Stream> {
    let mut ops = vec![Op::SeqScan {
        table: stmt.table.clone(),
    }];
    if let Some(filter) = &stmt.filter {
        ops.push(Op::Filter {
            expr: filter.clone(),
        });
    }
    ops.push(Op::TableDelete {
        table: stmt.table.clone(),
    });
    Ok(Stream::from_ops(ops))
}

pub(crate) fn run(tx: &Transaction<'_>, stmt: &DeleteStmt, params: &[Param]) -> Result<Output> {
    let stream = compile(stmt)?;
    Ok(Output::Count(run_count(tx, stream, params)?))
}
