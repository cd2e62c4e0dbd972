//! # Indexes
//!
//! An index maps an indexed value to the keys of the documents carrying
//! it, stored in its own KV store with composite keys:
//!
//! - **non-unique**: key = `encode(value) ∥ 0x00 ∥ document_key`, empty
//!   value. A range seek by value prefix yields document keys in document
//!   key order.
//! - **unique**: key = `encode(value)`, value = `document_key`. Inserting
//!   a second entry for the same non-null value fails with `DuplicateKey`.
//!
//! Null never participates in uniqueness: null entries are always stored
//! in the non-unique layout, so any number of documents may carry Null at
//! a unique-indexed path. `encode` is the untyped order-preserving
//! encoding; a declared index type only casts values before encoding.

use super::info::IndexInfo;
use crate::document::Value;
use crate::encoding::key;
use crate::errors::Error;
use crate::kv::{scan_range, Store};
use eyre::Result;
use std::fmt;

/// A handle on one index within a transaction.
pub struct Index {
    store: Box<dyn Store>,
    pub info: IndexInfo,
}

impl Index {
    pub(crate) fn new(store: Box<dyn Store>, info: IndexInfo) -> Index {
        Index { store, info }
    }

    /// Casts through the declared type, if any. Null passes through: it is
    /// stored, never compared.
    fn normalize(&self, value: &Value) -> Result<Value> {
        match (self.info.ty, value.is_null()) {
            (Some(ty), false) => value.cast_as(ty),
            _ => Ok(value.clone()),
        }
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let v = self.normalize(value)?;
        let mut buf = Vec::new();
        key::encode_value(&v, &mut buf);
        Ok(buf)
    }

    /// Records `(value, document key)`.
    pub fn insert(&self, value: &Value, doc_key: &[u8]) -> Result<()> {
        let mut enc = self.encode(value)?;

        if self.info.unique && !value.is_null() {
            match self.store.get(&enc) {
                Ok(_) => return Err(Error::DuplicateKey.into()),
                Err(err) if Error::KeyNotFound.is(&err) => {}
                Err(err) => return Err(err),
            }
            return self.store.put(&enc, doc_key);
        }

        enc.push(0x00);
        enc.extend_from_slice(doc_key);
        self.store.put(&enc, &[])
    }

    /// Removes `(value, document key)`. Fails with `KeyNotFound` when the
    /// pair is not present.
    pub fn delete(&self, value: &Value, doc_key: &[u8]) -> Result<()> {
        let mut enc = self.encode(value)?;

        if self.info.unique && !value.is_null() {
            let stored = self.store.get(&enc)?;
            if stored != doc_key {
                return Err(Error::KeyNotFound.into());
            }
            return self.store.delete(&enc);
        }

        enc.push(0x00);
        enc.extend_from_slice(doc_key);
        self.store.delete(&enc)
    }

    pub fn truncate(&self) -> Result<()> {
        self.store.truncate()
    }

    /// Calls `f` with the key of every document whose indexed value falls
    /// in `range`, in value order (document-key order within equal
    /// values). Null entries never match a range.
    pub fn iterate_range(
        &self,
        range: &ValueRange,
        reverse: bool,
        f: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let encode_bound = |v: &Value| -> Option<Vec<u8>> {
            // a bound that cannot be cast to the index type matches nothing
            self.encode(v).ok()
        };

        let lb = match &range.lo {
            Some(v) => match encode_bound(v) {
                Some(mut enc) => {
                    if !range.lo_inclusive {
                        // skip both the unique entry and every composite
                        // entry for this exact value
                        enc.push(0x01);
                    }
                    Some(enc)
                }
                None => return Ok(()),
            },
            // start after the null entries
            None => Some(vec![key::tag::NULL + 1]),
        };
        let ub = match &range.hi {
            Some(v) => match encode_bound(v) {
                Some(mut enc) => {
                    if range.hi_inclusive {
                        enc.push(0x01);
                    }
                    Some(enc)
                }
                None => return Ok(()),
            },
            None => None,
        };

        scan_range(self.store.as_ref(), lb.as_deref(), ub.as_deref(), reverse, &mut |k, v| {
            if !v.is_empty() {
                // unique layout: the document key is the entry value
                return f(v);
            }
            let boundary = key::encoded_value_len(k)?;
            f(&k[boundary + 1..])
        })
    }
}

/// A half-open or closed interval over indexed values, produced by the
/// optimizer from a comparison operator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueRange {
    pub lo: Option<Value>,
    pub lo_inclusive: bool,
    pub hi: Option<Value>,
    pub hi_inclusive: bool,
}

impl ValueRange {
    pub fn eq(v: Value) -> ValueRange {
        ValueRange {
            lo: Some(v.clone()),
            lo_inclusive: true,
            hi: Some(v),
            hi_inclusive: true,
        }
    }

    pub fn lt(v: Value) -> ValueRange {
        ValueRange {
            hi: Some(v),
            ..ValueRange::default()
        }
    }

    pub fn lte(v: Value) -> ValueRange {
        ValueRange {
            hi: Some(v),
            hi_inclusive: true,
            ..ValueRange::default()
        }
    }

    pub fn gt(v: Value) -> ValueRange {
        ValueRange {
            lo: Some(v),
            ..ValueRange::default()
        }
    }

    pub fn gte(v: Value) -> ValueRange {
        ValueRange {
            lo: Some(v),
            lo_inclusive: true,
            ..ValueRange::default()
        }
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lo {
            Some(v) => write!(f, "{}{}", if self.lo_inclusive { '[' } else { '(' }, v)?,
            None => write!(f, "(-inf")?,
        }
        write!(f, ", ")?;
        match &self.hi {
            Some(v) => write!(f, "{}{}", v, if self.hi_inclusive { ']' } else { ')' }),
            None => write!(f, "+inf)"),
        }
    }
}
