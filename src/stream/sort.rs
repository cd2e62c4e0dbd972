//! # Sort
//!
//! Materializes the input and re-emits it ordered by the value at a path.
//! Null sorts first ascending (last descending); values of different
//! types group by type. The sort is stable, so rows with equal keys keep
//! their input order. Storage keys survive the materialization, which
//! keeps sorted update/delete pipelines working.

use super::Stream;
use crate::document::{FieldBuffer, Path, Value, ValueType};
use crate::expr::Environment;
use eyre::Result;
use std::cmp::Ordering;

pub(crate) fn iterate(
    path: &Path,
    reverse: bool,
    stream: &Stream,
    i: usize,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let mut rows: Vec<(Value, FieldBuffer, Option<Vec<u8>>)> = Vec::new();

    stream.iter_input(i, env, &mut |e| {
        let doc = match e.document() {
            Some(d) => d,
            None => eyre::bail!("Sort requires a document"),
        };
        let key = path.get_from(doc).unwrap_or(Value::Null);
        rows.push((
            key,
            FieldBuffer::copy_from(doc)?,
            e.key().map(|k| k.to_vec()),
        ));
        Ok(())
    })?;

    rows.sort_by(|(a, _, _), (b, _, _)| {
        let ord = sort_cmp(a, b);
        if reverse {
            ord.reverse()
        } else {
            ord
        }
    });

    for (_, fb, key) in &rows {
        let child = env.child().with_doc(fb);
        let child = match key {
            Some(k) => child.with_key(k),
            None => child,
        };
        f(&child)?;
    }
    Ok(())
}

/// Total order over sort keys: Null first, then by type group, then by
/// value.
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    match type_rank(a.type_of()).cmp(&type_rank(b.type_of())) {
        Ordering::Equal => a.compare(b).unwrap_or(Ordering::Equal),
        ord => ord,
    }
}

fn type_rank(ty: ValueType) -> u8 {
    match ty {
        ValueType::Null => 0,
        ValueType::Bool => 1,
        // integers and doubles interleave by value
        ValueType::Integer | ValueType::Double => 2,
        ValueType::Text => 3,
        ValueType::Blob => 4,
        ValueType::Array => 5,
        ValueType::Document => 6,
    }
}
