//! # EXPLAIN
//!
//! Compiles and optimizes the inner statement without running it, and
//! returns a single row whose `plan` column carries the pretty-printed
//! pipeline.

use super::{delete, insert, select, update, Output, Statement};
use crate::database::Transaction;
use crate::document::{FieldBuffer, Value};
use eyre::{bail, Result};

pub(crate) fn run(tx: &Transaction<'_>, inner: &Statement) -> Result<Output> {
    let stream = match inner {
        Statement::Select(s) => select::compile(s)?,
        Statement::Insert(s) => insert::compile(s)?,
        Statement::Update(s) => update::compile(s)?,
        Statement::Delete(s) => delete::compile(s)?,
        _ => bail!("EXPLAIN supports queries and DML statements"),
    };
    let optimized = crate::planner::optimize(stream, tx)?;

    let row = FieldBuffer::new().add("plan", Value::Text(optimized.to_string()));
    Ok(Output::Rows(vec![row]))
}
