//! # Source Operators
//!
//! Pipeline roots: table scans, index scans, primary-key range scans, and
//! literal expression lists. Each emits child environments carrying the
//! current document and, for storage-backed sources, its key.

use crate::catalog::ValueRange;
use crate::document::Value;
use crate::expr::{Environment, Expr};
use eyre::{bail, Result};

fn tx_of<'a>(env: &Environment<'a>) -> Result<&'a crate::database::Transaction<'a>> {
    env.tx()
        .ok_or_else(|| eyre::eyre!("scan requires a transaction in the environment"))
}

pub(crate) fn seq_scan(
    table: &str,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let tx = tx_of(env)?;
    let table = tx.table(table)?;
    table.iterate(&mut |key, doc| {
        let child = env.child().with_doc(doc).with_key(key);
        f(&child)
    })
}

pub(crate) fn pk_scan(
    table: &str,
    range: &ValueRange,
    reverse: bool,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let tx = tx_of(env)?;
    let table = tx.table(table)?;
    table.iterate_pk_range(range, reverse, &mut |key, doc| {
        let child = env.child().with_doc(doc).with_key(key);
        f(&child)
    })
}

pub(crate) fn index_scan(
    index: &str,
    range: &ValueRange,
    reverse: bool,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let tx = tx_of(env)?;
    let index = tx.index(index)?;
    let table = tx.table(&index.info.table)?;

    index.iterate_range(range, reverse, &mut |doc_key| {
        tx.check_cancelled()?;
        let payload = table.get_raw(doc_key)?;
        let doc = tx.codec().document(&payload);
        let child = env.child().with_doc(doc.as_ref()).with_key(doc_key);
        f(&child)
    })
}

pub(crate) fn expressions(
    exprs: &[Expr],
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    for expr in exprs {
        match expr.eval(env)? {
            Value::Document(fb) => {
                let child = env.child().with_doc(&fb);
                f(&child)?;
            }
            other => bail!("expected a document, {} evaluates to {}", expr, other.type_of()),
        }
    }
    Ok(())
}
