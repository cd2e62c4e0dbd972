//! # Table Sinks
//!
//! Pipeline tails for writes. TableInsert treats each incoming document
//! as a new row; TableReplace and TableDelete act on the storage key the
//! row picked up from its source scan. All three re-emit their rows, so a
//! driver can count affected documents.

use super::Stream;
use crate::expr::Environment;
use eyre::{bail, Result};

pub(crate) fn insert(
    table: &str,
    stream: &Stream,
    i: usize,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let tx = tx_of(env)?;
    let table = tx.table(table)?;

    stream.iter_input(i, env, &mut |e| {
        let doc = match e.document() {
            Some(d) => d,
            None => bail!("TableInsert requires a document"),
        };
        let key = table.insert(doc)?;
        let child = e.child().with_key(&key);
        f(&child)
    })
}

pub(crate) fn replace(
    table: &str,
    stream: &Stream,
    i: usize,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let tx = tx_of(env)?;
    let table = tx.table(table)?;

    stream.iter_input(i, env, &mut |e| {
        let key = match e.key() {
            Some(k) => k,
            None => bail!("TableReplace requires a storage key in the environment"),
        };
        let doc = match e.document() {
            Some(d) => d,
            None => bail!("TableReplace requires a document"),
        };
        table.replace(key, doc)?;
        f(e)
    })
}

pub(crate) fn delete(
    table: &str,
    stream: &Stream,
    i: usize,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let tx = tx_of(env)?;
    let table = tx.table(table)?;

    stream.iter_input(i, env, &mut |e| {
        let key = match e.key() {
            Some(k) => k,
            None => bail!("TableDelete requires a storage key in the environment"),
        };
        table.delete(key)?;
        f(e)
    })
}

fn tx_of<'a>(env: &Environment<'a>) -> Result<&'a crate::database::Transaction<'a>> {
    env.tx()
        .ok_or_else(|| eyre::eyre!("table sink requires a transaction in the environment"))
}
