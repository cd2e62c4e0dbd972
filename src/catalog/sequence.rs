//! # Sequences
//!
//! A sequence hands out values in increments of `increment_by`, leasing
//! `cache` values at a time: persistence (`__sequences`) is only touched
//! when a lease is exhausted, and the persisted value is the lease
//! high-water mark, never the last issued value.
//!
//! Runtime state (`current`, `cached`) lives in a shared map on the
//! database, owned by the writable transaction. On rollback the touched
//! entries are discarded, so the next transaction re-leases from the
//! committed high-water mark: sequences produce monotonic gaps, never
//! duplicates of committed values.

use crate::catalog::SEQUENCES_STORE;
use crate::database::Transaction;
use crate::document::{FieldBuffer, Value};
use crate::encoding::key;
use crate::errors::Error;
use crate::kv::Store;
use eyre::Result;

/// In-memory lease state of one sequence.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SequenceState {
    /// Last issued value.
    pub current: Option<i64>,
    /// Values issued from the current lease.
    pub cached: u64,
}

fn state_key(name: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(name.len() + 2);
    key::encode_value(&Value::Text(name.to_string()), &mut buf);
    buf
}

fn state_store(tx: &Transaction<'_>) -> Result<Box<dyn Store>> {
    tx.kv().get_store(SEQUENCES_STORE)
}

/// Writes the initial, never-leased state row.
pub(crate) fn init_state(tx: &Transaction<'_>, name: &str) -> Result<()> {
    let doc = FieldBuffer::new()
        .add("name", Value::Text(name.to_string()))
        .add("seq", Value::Null);
    write_state(tx, name, &doc)
}

/// Removes the state row and the in-memory lease state.
pub(crate) fn drop_state(tx: &Transaction<'_>, name: &str) -> Result<()> {
    match state_store(tx)?.delete(&state_key(name)) {
        Ok(()) => {}
        Err(err) if Error::KeyNotFound.is(&err) => {}
        Err(err) => return Err(err),
    }
    tx.db().forget_sequence(name);
    Ok(())
}

/// Reads the persisted lease high-water mark, `None` when the sequence has
/// never leased.
pub(crate) fn read_lease(tx: &Transaction<'_>, name: &str) -> Result<Option<i64>> {
    let bytes = match state_store(tx)?.get(&state_key(name)) {
        Ok(bytes) => bytes,
        Err(err) if Error::KeyNotFound.is(&err) => return Ok(None),
        Err(err) => return Err(err),
    };
    let doc = tx.codec().document(&bytes);
    match doc.get_by_field("seq") {
        Ok(Value::Integer(lease)) => Ok(Some(lease)),
        _ => Ok(None),
    }
}

fn write_lease(tx: &Transaction<'_>, name: &str, lease: i64) -> Result<()> {
    let doc = FieldBuffer::new()
        .add("name", Value::Text(name.to_string()))
        .add("seq", Value::Integer(lease));
    write_state(tx, name, &doc)
}

fn write_state(tx: &Transaction<'_>, name: &str, doc: &FieldBuffer) -> Result<()> {
    let mut bytes = Vec::new();
    tx.codec().encode_document(doc, &mut bytes)?;
    state_store(tx)?.put(&state_key(name), &bytes)
}

impl<'db> Transaction<'db> {
    /// Issues the next value of a sequence.
    pub fn sequence_next(&self, name: &str) -> Result<i64> {
        self.check_cancelled()?;
        if !self.is_writable() {
            return Err(Error::SequenceNotWritable.into());
        }

        let info = self.sequence_info(name)?;

        let mut states = self.db().sequence_states().lock();
        let state = match states.get(name).copied() {
            Some(state) => state,
            None => match read_lease(self, name)? {
                // resume past the committed lease
                Some(lease) => SequenceState {
                    current: Some(lease),
                    cached: info.cache,
                },
                None => SequenceState::default(),
            },
        };
        self.record_sequence_touch(name);

        let stepped = match state.current {
            None => Some(info.start),
            Some(cur) => cur.checked_add(info.increment_by),
        };

        let candidate = match stepped {
            Some(c) if c < info.min => cycle_or_fail(&info, info.max, name)?,
            Some(c) if c > info.max => cycle_or_fail(&info, info.min, name)?,
            Some(c) => c,
            // arithmetic overflow is out of range in the step direction
            None if info.increment_by > 0 => cycle_or_fail(&info, info.min, name)?,
            None => cycle_or_fail(&info, info.max, name)?,
        };

        let mut state = state;
        state.cached += 1;
        if state.current.is_some() && state.cached <= info.cache {
            state.current = Some(candidate);
            states.insert(name.to_string(), state);
            return Ok(candidate);
        }

        state.cached = 1;
        let sign: i64 = if info.increment_by > 0 { 1 } else { -1 };
        let span = (info.cache as i64 - 1) * sign;
        let lease = candidate
            .checked_add(span)
            .unwrap_or(if sign > 0 { info.max } else { info.min })
            .clamp(info.min, info.max);
        write_lease(self, name, lease)?;

        state.current = Some(candidate);
        states.insert(name.to_string(), state);
        Ok(candidate)
    }
}

fn cycle_or_fail(
    info: &crate::catalog::SequenceInfo,
    wrap_to: i64,
    name: &str,
) -> Result<i64> {
    if info.cycle {
        Ok(wrap_to)
    } else {
        Err(Error::SequenceExhausted(name.to_string()).into())
    }
}
