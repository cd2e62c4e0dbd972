//! # UPDATE
//!
//! `UPDATE t SET … / UNSET … [WHERE …]` compiles to a scan feeding the
//! path mutations and a TableReplace sink. Setting a path whose
//! intermediate fragments do not resolve fails with `PathInvalid`: UPDATE
//! never fabricates intermediate documents.

use super::{run_count, Output};
use crate::database::{Param, Transaction};
use crate::document::Path;
use crate::expr::Expr;
use crate::stream::{Op, Stream};
use eyre::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set(Path, Expr),
    Unset(Path),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: String,
    pub actions: Vec<UpdateAction>,
    pub filter: Option<Expr>,
}

pub(crate) fn compile(stmt: &UpdateStmt) -> Result<Stream> {
    let mut ops = vec![Op::SeqScan {
        table: stmt.table.clone(),
    }];
    if let Some(filter) = &stmt.filter {
        ops.push(Op::Filter {
            expr: filter.clone(),
        });
    }
    for action in &stmt.actions {
        ops.push(match action {
            UpdateAction::Set(path, expr) => Op::Set {
                path: path.clone(),
                expr: expr.clone(),
            },
            UpdateAction::Unset(path) => Op::Unset { path: path.clone() },
        });
    }
    ops.push(Op::TableReplace {
        table: stmt.table.clone(),
    });
    Ok(Stream::from_ops(ops))
}

pub(crate) fn run(tx: &Transaction<'_>, stmt: &UpdateStmt, params: &[Param]) -> Result<Output> {
    let stream = compile(stmt)?;
    Ok(Output::Count(run_count(tx, stream, params)?))
}
