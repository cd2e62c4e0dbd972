//! # Tables
//!
//! A table stores codec-encoded documents in its own KV store, keyed by the
//! declared primary key (order-preserving encoding) or by an
//! auto-generated docid varint. Every write keeps the table's indexes in
//! sync; every read hands out documents backed by the store so that only
//! the accessed fields are decoded.

use super::index::ValueRange;
use super::info::{FieldConstraint, TableInfo};
use crate::database::Transaction;
use crate::document::{Document, FieldBuffer, Value};
use crate::encoding::{key, varint};
use crate::errors::Error;
use crate::kv::{scan_range, Store};
use eyre::Result;

/// A handle on one table within a transaction.
pub struct Table<'a> {
    tx: &'a Transaction<'a>,
    store: Box<dyn Store>,
    info: TableInfo,
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("info", &self.info).finish()
    }
}

impl<'a> Table<'a> {
    pub(crate) fn new(tx: &'a Transaction<'a>, store: Box<dyn Store>, info: TableInfo) -> Table<'a> {
        Table { tx, store, info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Validates and inserts a document, returning its storage key.
    ///
    /// Fails with `DuplicateDocument` when the key is already present or
    /// when a unique index rejects one of the document's values; the
    /// caller is expected to roll the transaction back in that case.
    pub fn insert(&self, d: &dyn Document) -> Result<Vec<u8>> {
        self.tx.check_cancelled()?;
        if self.info.read_only {
            return Err(Error::ReadOnly.into());
        }

        let fb = self.validate_constraints(d)?;
        let key = self.generate_key(&fb)?;

        match self.store.get(&key) {
            Ok(_) => return Err(Error::DuplicateDocument.into()),
            Err(err) if Error::KeyNotFound.is(&err) => {}
            Err(err) => return Err(err),
        }

        let mut payload = Vec::new();
        self.tx.codec().encode_document(&fb, &mut payload)?;
        self.store.put(&key, &payload)?;

        for index in self.tx.table_indexes(&self.info.name)? {
            let v = index.info.path.get_from(&fb).unwrap_or(Value::Null);
            if let Err(err) = index.insert(&v, &key) {
                if Error::DuplicateKey.is(&err) {
                    return Err(Error::DuplicateDocument.into());
                }
                return Err(err);
            }
        }

        Ok(key)
    }

    /// Replaces the document at `key`, keeping indexes in sync. Fails with
    /// `DocumentNotFound` when the key does not exist.
    pub fn replace(&self, key: &[u8], d: &dyn Document) -> Result<()> {
        self.tx.check_cancelled()?;
        if self.info.read_only {
            return Err(Error::ReadOnly.into());
        }

        let fb = self.validate_constraints(d)?;
        let old = self.get(key)?;
        let indexes = self.tx.table_indexes(&self.info.name)?;

        for index in &indexes {
            let v = index.info.path.get_from(&old).unwrap_or(Value::Null);
            index.delete(&v, key)?;
        }

        let mut payload = Vec::new();
        self.tx.codec().encode_document(&fb, &mut payload)?;
        self.store.put(key, &payload)?;

        for index in &indexes {
            let v = index.info.path.get_from(&fb).unwrap_or(Value::Null);
            if let Err(err) = index.insert(&v, key) {
                if Error::DuplicateKey.is(&err) {
                    return Err(Error::DuplicateDocument.into());
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Deletes the document at `key` and its index entries.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.tx.check_cancelled()?;
        if self.info.read_only {
            return Err(Error::ReadOnly.into());
        }

        let old = self.get(key)?;
        for index in self.tx.table_indexes(&self.info.name)? {
            let v = index.info.path.get_from(&old).unwrap_or(Value::Null);
            index.delete(&v, key)?;
        }
        self.store.delete(key)
    }

    /// Fetches one document as an owned buffer. Fails with
    /// `DocumentNotFound`.
    pub fn get(&self, key: &[u8]) -> Result<FieldBuffer> {
        let bytes = self.get_raw(key)?;
        let doc = self.tx.codec().document(&bytes);
        FieldBuffer::copy_from(doc.as_ref())
    }

    /// Fetches the encoded payload of one document.
    pub fn get_raw(&self, key: &[u8]) -> Result<Vec<u8>> {
        match self.store.get(key) {
            Ok(bytes) => Ok(bytes),
            Err(err) if Error::KeyNotFound.is(&err) => Err(Error::DocumentNotFound.into()),
            Err(err) => Err(err),
        }
    }

    /// Forward scan in key order. Documents passed to `f` are backed by
    /// the iterator and must be copied to outlive the call.
    pub fn iterate(&self, f: &mut dyn FnMut(&[u8], &dyn Document) -> Result<()>) -> Result<()> {
        scan_range(self.store.as_ref(), None, None, false, &mut |k, v| {
            self.tx.check_cancelled()?;
            let doc = self.tx.codec().document(v);
            f(k, doc.as_ref())
        })
    }

    /// Scan restricted to a primary-key range.
    pub fn iterate_pk_range(
        &self,
        range: &ValueRange,
        reverse: bool,
        f: &mut dyn FnMut(&[u8], &dyn Document) -> Result<()>,
    ) -> Result<()> {
        let pk_ty = self.info.primary_key().and_then(|pk| pk.ty);

        let encode = |v: &Value| -> Result<Option<Vec<u8>>> {
            let mut buf = Vec::new();
            match pk_ty {
                Some(ty) => match v.cast_as(ty) {
                    Ok(cast) if !cast.is_null() => {
                        key::encode_typed(ty, &cast, &mut buf)?;
                        Ok(Some(buf))
                    }
                    // a bound that cannot be cast matches nothing
                    _ => Ok(None),
                },
                None => {
                    key::encode_value(v, &mut buf);
                    Ok(Some(buf))
                }
            }
        };

        let lb = match &range.lo {
            Some(v) => match encode(v)? {
                Some(mut enc) => {
                    if !range.lo_inclusive {
                        enc.push(0x00);
                    }
                    Some(enc)
                }
                None => return Ok(()),
            },
            None => None,
        };
        let ub = match &range.hi {
            Some(v) => match encode(v)? {
                Some(mut enc) => {
                    if range.hi_inclusive {
                        enc.push(0x00);
                    }
                    Some(enc)
                }
                None => return Ok(()),
            },
            None => None,
        };

        scan_range(self.store.as_ref(), lb.as_deref(), ub.as_deref(), reverse, &mut |k, v| {
            self.tx.check_cancelled()?;
            let doc = self.tx.codec().document(v);
            f(k, doc.as_ref())
        })
    }

    /// Deletes every document and clears the table's indexes.
    pub fn truncate(&self) -> Result<()> {
        if self.info.read_only {
            return Err(Error::ReadOnly.into());
        }
        for index in self.tx.table_indexes(&self.info.name)? {
            index.truncate()?;
        }
        self.store.truncate()
    }

    /// Applies the table's field constraints in declaration order and
    /// returns the normalized document.
    fn validate_constraints(&self, d: &dyn Document) -> Result<FieldBuffer> {
        let mut fb = FieldBuffer::copy_from(d)?;

        for c in &self.info.constraints {
            match fb.get_path(&c.path) {
                Ok(v) => {
                    let v = match c.ty {
                        Some(ty) => {
                            let cast = v.cast_as(ty)?;
                            fb.set(&c.path, cast.clone())?;
                            cast
                        }
                        None => v,
                    };
                    if c.is_not_null && v.is_null() {
                        return Err(Error::NotNull(c.path.to_string()).into());
                    }
                }
                Err(_) => {
                    if c.is_not_null {
                        return Err(Error::NotNull(c.path.to_string()).into());
                    }
                    if let Some(default) = &c.default_value {
                        fb.set(&c.path, default.clone())?;
                    }
                }
            }
        }
        Ok(fb)
    }

    /// Builds the storage key: the encoded primary key when one is
    /// declared, otherwise the next docid from the implicit sequence.
    fn generate_key(&self, fb: &FieldBuffer) -> Result<Vec<u8>> {
        if let Some(pk) = self.info.primary_key() {
            return self.encode_pk(pk, fb);
        }

        let seq = self
            .info
            .docid_sequence
            .as_deref()
            .ok_or_else(|| eyre::eyre!("table {} has no key source", self.info.name))?;
        let docid = self.tx.sequence_next(seq)?;
        let mut buf = Vec::new();
        varint::encode_varint(docid as u64, &mut buf);
        Ok(buf)
    }

    fn encode_pk(&self, pk: &FieldConstraint, fb: &FieldBuffer) -> Result<Vec<u8>> {
        let v = match fb.get_path(&pk.path) {
            Ok(v) if !v.is_null() => v,
            _ => return Err(Error::PrimaryKeyMissing(pk.path.to_string()).into()),
        };

        let mut buf = Vec::new();
        match pk.ty {
            // constraint validation already cast the stored value
            Some(ty) => key::encode_typed(ty, &v, &mut buf)?,
            None => key::encode_value(&v, &mut buf),
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::info::{FieldConstraint, IndexInfo, TableInfo};
    use crate::database::Database;
    use crate::document::{Path, ValueType};
    use crate::kv::MemoryEngine;

    fn db() -> Database {
        Database::new(MemoryEngine::new()).unwrap()
    }

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn users_info() -> TableInfo {
        TableInfo::new("users")
            .with_constraint(
                FieldConstraint::new(p("id"))
                    .typed(ValueType::Integer)
                    .primary_key(),
            )
            .with_constraint(FieldConstraint::new(p("name")).typed(ValueType::Text))
    }

    fn user(id: i64, name: &str) -> FieldBuffer {
        FieldBuffer::new()
            .add("id", Value::Integer(id))
            .add("name", Value::Text(name.into()))
    }

    #[test]
    fn insert_then_get_round_trips_the_document() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        let table = tx.table("users").unwrap();

        let key = table.insert(&user(1, "a")).unwrap();
        assert_eq!(table.get(&key).unwrap(), user(1, "a"));
    }

    #[test]
    fn duplicate_primary_key_fails_with_duplicate_document() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        let table = tx.table("users").unwrap();

        table.insert(&user(1, "a")).unwrap();
        let err = table.insert(&user(1, "x")).unwrap_err();
        assert!(Error::DuplicateDocument.is(&err));
    }

    #[test]
    fn missing_primary_key_fails_with_primary_key_missing() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        let table = tx.table("users").unwrap();

        let doc = FieldBuffer::new().add("name", Value::Text("a".into()));
        let err = table.insert(&doc).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PrimaryKeyMissing(_))
        ));
    }

    #[test]
    fn declared_type_casts_the_stored_value() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        let table = tx.table("users").unwrap();

        // id arrives as text and is normalized to an integer
        let doc = FieldBuffer::new()
            .add("id", Value::Text("7".into()))
            .add("name", Value::Text("a".into()));
        let key = table.insert(&doc).unwrap();
        assert_eq!(table.get(&key).unwrap().get("id"), Some(&Value::Integer(7)));
    }

    #[test]
    fn uncastable_value_fails_with_type_mismatch() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        let table = tx.table("users").unwrap();

        let doc = FieldBuffer::new().add("id", Value::Text("foo".into()));
        let err = table.insert(&doc).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TypeMismatch(_, _))
        ));
    }

    #[test]
    fn not_null_rejects_absent_and_null_values() {
        let db = db();
        let tx = db.begin(true).unwrap();
        let info = TableInfo::new("t")
            .with_constraint(FieldConstraint::new(p("a")).not_null());
        tx.create_table(info).unwrap();
        let table = tx.table("t").unwrap();

        let err = table.insert(&FieldBuffer::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotNull(_))));

        let err = table
            .insert(&FieldBuffer::new().add("a", Value::Null))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotNull(_))));
    }

    #[test]
    fn absent_field_with_default_gets_the_default() {
        let db = db();
        let tx = db.begin(true).unwrap();
        let info = TableInfo::new("t")
            .with_constraint(FieldConstraint::new(p("level")).default(Value::Integer(3)));
        tx.create_table(info).unwrap();
        let table = tx.table("t").unwrap();

        let key = table.insert(&FieldBuffer::new().add("msg", Value::Text("hi".into()))).unwrap();
        assert_eq!(table.get(&key).unwrap().get("level"), Some(&Value::Integer(3)));
    }

    #[test]
    fn docid_tables_generate_monotone_varint_keys() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(TableInfo::new("logs")).unwrap();
        let table = tx.table("logs").unwrap();

        let k1 = table.insert(&FieldBuffer::new().add("n", Value::Integer(1))).unwrap();
        let k2 = table.insert(&FieldBuffer::new().add("n", Value::Integer(2))).unwrap();
        assert!(k1 < k2);

        let (docid, _) = varint::decode_varint(&k1).unwrap();
        assert_eq!(docid, 1);
    }

    #[test]
    fn iterate_yields_documents_in_primary_key_order() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        let table = tx.table("users").unwrap();
        for id in [3, 1, 2] {
            table.insert(&user(id, "x")).unwrap();
        }

        let mut ids = Vec::new();
        table
            .iterate(&mut |_, doc| {
                ids.push(doc.get_by_field("id").unwrap());
                Ok(())
            })
            .unwrap();
        assert_eq!(
            ids,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn replace_updates_payload_and_indexes() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        tx.create_index(IndexInfo::new("idx_users_name", "users", p("name")))
            .unwrap();
        let table = tx.table("users").unwrap();

        let key = table.insert(&user(1, "before")).unwrap();
        table.replace(&key, &user(1, "after")).unwrap();

        assert_eq!(
            table.get(&key).unwrap().get("name"),
            Some(&Value::Text("after".into()))
        );

        let index = tx.index("idx_users_name").unwrap();
        let mut hits = Vec::new();
        index
            .iterate_range(&ValueRange::eq(Value::Text("after".into())), false, &mut |k| {
                hits.push(k.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(hits, vec![key.clone()]);

        let mut stale = 0;
        index
            .iterate_range(&ValueRange::eq(Value::Text("before".into())), false, &mut |_| {
                stale += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(stale, 0);
    }

    #[test]
    fn delete_removes_document_and_index_entries() {
        let db = db();
        let tx = db.begin(true).unwrap();
        tx.create_table(users_info()).unwrap();
        tx.create_index(IndexInfo::new("idx_users_name", "users", p("name")))
            .unwrap();
        let table = tx.table("users").unwrap();

        let key = table.insert(&user(1, "a")).unwrap();
        table.delete(&key).unwrap();

        assert!(Error::DocumentNotFound.is(&table.get(&key).unwrap_err()));

        let index = tx.index("idx_users_name").unwrap();
        let mut hits = 0;
        index
            .iterate_range(&ValueRange::eq(Value::Text("a".into())), false, &mut |_| {
                hits += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(hits, 0);
    }
}
