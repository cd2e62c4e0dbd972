//! # Statements
//!
//! The statement AST produced by the external SQL parser, and its
//! execution. Every DML statement and query compiles to a [`Stream`]
//! pipeline, runs through the optimizer, and is driven to completion
//! under the transaction; DDL statements call straight into the catalog.
//!
//! `IF NOT EXISTS` / `IF EXISTS` swallow `AlreadyExists` / `NotFound` and
//! succeed affecting nothing.

pub mod ddl;
pub mod delete;
pub mod explain;
pub mod insert;
pub mod select;
pub mod update;

pub use ddl::{
    ConstraintDef, CreateIndexStmt, CreateSequenceStmt, CreateTableStmt, DropStmt, ReindexStmt,
};
pub use delete::DeleteStmt;
pub use insert::{InsertSource, InsertStmt};
pub use select::{OrderBy, SelectStmt};
pub use update::{UpdateAction, UpdateStmt};

use crate::database::{Param, Transaction};
use crate::document::FieldBuffer;
use crate::expr::{Environment, Expr};
use crate::stream::Stream;
use eyre::{bail, Result};

/// One parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStmt),
    CreateIndex(CreateIndexStmt),
    CreateSequence(CreateSequenceStmt),
    DropTable(DropStmt),
    DropIndex(DropStmt),
    DropSequence(DropStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Reindex(ReindexStmt),
    Explain(Box<Statement>),
}

impl Statement {
    /// Whether the statement can run under a read transaction. A SELECT
    /// evaluating `NEXT VALUE FOR` needs a writable one.
    pub fn is_read_only(&self) -> bool {
        match self {
            Statement::Select(s) => !s.has_side_effects(),
            Statement::Explain(_) => true,
            _ => false,
        }
    }
}

/// Result of executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Materialized result rows of a query.
    Rows(Vec<FieldBuffer>),
    /// Number of documents a write affected.
    Count(usize),
    /// DDL affecting no rows.
    None,
}

impl<'db> Transaction<'db> {
    /// Executes one statement under this transaction.
    pub fn execute(&self, stmt: &Statement, params: &[Param]) -> Result<Output> {
        match stmt {
            Statement::CreateTable(s) => ddl::create_table(self, s),
            Statement::CreateIndex(s) => ddl::create_index(self, s),
            Statement::CreateSequence(s) => ddl::create_sequence(self, s),
            Statement::DropTable(s) => ddl::drop_table(self, s),
            Statement::DropIndex(s) => ddl::drop_index(self, s),
            Statement::DropSequence(s) => ddl::drop_sequence(self, s),
            Statement::Insert(s) => insert::run(self, s, params),
            Statement::Select(s) => select::run(self, s, params),
            Statement::Update(s) => update::run(self, s, params),
            Statement::Delete(s) => delete::run(self, s, params),
            Statement::Reindex(s) => ddl::reindex(self, s),
            Statement::Explain(inner) => explain::run(self, inner),
        }
    }
}

/// Optimizes and drives a pipeline, materializing every emitted document.
pub(crate) fn run_rows(
    tx: &Transaction<'_>,
    stream: Stream,
    params: &[Param],
) -> Result<Vec<FieldBuffer>> {
    let stream = crate::planner::optimize(stream, tx)?;
    let env = Environment::root(tx, params);
    let mut rows = Vec::new();
    stream.iterate(&env, &mut |e| {
        tx.check_cancelled()?;
        let doc = match e.document() {
            Some(d) => d,
            None => bail!("pipeline emitted a row without a document"),
        };
        rows.push(FieldBuffer::copy_from(doc)?);
        Ok(())
    })?;
    Ok(rows)
}

/// Optimizes and drives a write pipeline, counting affected rows.
pub(crate) fn run_count(tx: &Transaction<'_>, stream: Stream, params: &[Param]) -> Result<usize> {
    let stream = crate::planner::optimize(stream, tx)?;
    let env = Environment::root(tx, params);
    let mut count = 0;
    stream.iterate(&env, &mut |_| {
        tx.check_cancelled()?;
        count += 1;
        Ok(())
    })?;
    Ok(count)
}

/// Collects the aggregate references of a projection, deduplicated.
pub(crate) fn collect_aggregates(exprs: &[Expr]) -> Vec<crate::expr::AggregateFunc> {
    let mut aggs = Vec::new();
    for e in exprs {
        e.walk(&mut |node| {
            if let Expr::Aggregate(a) = node {
                if !aggs.contains(a) {
                    aggs.push(a.clone());
                }
            }
            true
        });
    }
    aggs
}
