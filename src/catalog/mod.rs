//! # Catalog
//!
//! Persistent metadata management. Object definitions live in the reserved
//! `__config` store as codec-encoded documents keyed by the order-preserving
//! text encoding of the object name; sequence lease state lives in
//! `__sequences`. Names share one namespace across tables, indexes, and
//! sequences, and names starting with `_` are reserved for the system.
//!
//! Metadata is always read through the transaction's KV snapshot: a writer
//! sees its own DDL immediately, readers see the last committed catalog,
//! and rollback discards catalog changes together with data changes.

pub mod index;
pub mod info;
pub mod sequence;
pub mod table;

pub use index::{Index, ValueRange};
pub use info::{FieldConstraint, IndexInfo, SequenceInfo, TableInfo};
pub use table::Table;

use crate::database::Transaction;
use crate::document::{FieldBuffer, Value};
use crate::encoding::key;
use crate::errors::Error;
use crate::kv::Store;
use eyre::{bail, Result};
use tracing::debug;

/// Store holding table, index, and sequence definitions.
pub const CONFIG_STORE: &[u8] = b"__config";
/// Store holding sequence lease state.
pub const SEQUENCES_STORE: &[u8] = b"__sequences";

/// Creates the reserved stores on first open.
pub(crate) fn bootstrap(tx: &Transaction<'_>) -> Result<()> {
    for id in [CONFIG_STORE, SEQUENCES_STORE] {
        match tx.kv().create_store(id) {
            Ok(()) => {}
            Err(err) if Error::StoreAlreadyExists.is(&err) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn reserved(name: &str) -> bool {
    name.starts_with('_')
}

fn check_user_name(name: &str) -> Result<()> {
    if reserved(name) {
        bail!("name {:?} is reserved for system objects", name);
    }
    Ok(())
}

/// Storage key of a catalog object inside `__config`.
fn config_key(name: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(name.len() + 2);
    key::encode_value(&Value::Text(name.to_string()), &mut buf);
    buf
}

fn config_store(tx: &Transaction<'_>) -> Result<Box<dyn Store>> {
    tx.kv().get_store(CONFIG_STORE)
}

fn read_config(tx: &Transaction<'_>, name: &str) -> Result<Option<FieldBuffer>> {
    let store = config_store(tx)?;
    match store.get(&config_key(name)) {
        Ok(bytes) => {
            let doc = tx.codec().document(&bytes);
            Ok(Some(FieldBuffer::copy_from(doc.as_ref())?))
        }
        Err(err) if Error::KeyNotFound.is(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_config(tx: &Transaction<'_>, name: &str, doc: &FieldBuffer) -> Result<()> {
    let store = config_store(tx)?;
    let mut bytes = Vec::new();
    tx.codec().encode_document(doc, &mut bytes)?;
    store.put(&config_key(name), &bytes)
}

fn delete_config(tx: &Transaction<'_>, name: &str) -> Result<()> {
    config_store(tx)?.delete(&config_key(name))
}

fn config_kind(doc: &FieldBuffer) -> &str {
    match doc.get("kind") {
        Some(Value::Text(kind)) => kind,
        _ => "",
    }
}

/// Walks every definition document in `__config`.
fn scan_config(tx: &Transaction<'_>, f: &mut dyn FnMut(&FieldBuffer) -> Result<()>) -> Result<()> {
    let store = config_store(tx)?;
    let mut it = store.iterator(Default::default())?;
    let mut buf = Vec::new();
    it.seek(None);
    while it.valid() {
        tx.check_cancelled()?;
        it.value_copy(&mut buf)?;
        let doc = tx.codec().document(&buf);
        let fb = FieldBuffer::copy_from(doc.as_ref())?;
        f(&fb)?;
        it.next();
    }
    Ok(())
}

impl<'db> Transaction<'db> {
    /// Creates a table. When no primary key is declared, an implicit docid
    /// sequence named `<table>_seq` is created along with it.
    pub fn create_table(&self, mut info: TableInfo) -> Result<()> {
        self.check_cancelled()?;
        if !self.is_writable() {
            return Err(Error::TxReadOnly.into());
        }
        check_user_name(&info.name)?;
        info.validate()?;

        if read_config(self, &info.name)?.is_some() {
            return Err(Error::AlreadyExists(info.name.clone()).into());
        }

        info.store_id = [b"t_", info.name.as_bytes()].concat();
        self.kv().create_store(&info.store_id)?;

        if info.primary_key().is_none() {
            let seq_name = format!("{}_seq", info.name);
            let mut seq = SequenceInfo::with_defaults(&seq_name, 1);
            seq.owner_table = Some(info.name.clone());
            self.create_sequence_unchecked(seq)?;
            info.docid_sequence = Some(seq_name);
        }

        write_config(self, &info.name, &info.to_document())?;
        debug!(table = %info.name, "created table");
        Ok(())
    }

    /// Opens a table. Fails with `NotFound`.
    pub fn table(&self, name: &str) -> Result<Table<'_>> {
        let doc = match read_config(self, name)? {
            Some(doc) if config_kind(&doc) == "table" => doc,
            _ => return Err(Error::NotFound(name.to_string()).into()),
        };
        let info = TableInfo::from_document(&doc)?;
        let store = self.kv().get_store(&info.store_id)?;
        Ok(Table::new(self, store, info))
    }

    /// Drops a table, every index referencing it, and its implicit docid
    /// sequence.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.check_cancelled()?;
        if !self.is_writable() {
            return Err(Error::TxReadOnly.into());
        }

        let doc = match read_config(self, name)? {
            Some(doc) if config_kind(&doc) == "table" => doc,
            _ => return Err(Error::NotFound(name.to_string()).into()),
        };
        let info = TableInfo::from_document(&doc)?;

        for idx in self.list_indexes(name)? {
            self.kv().drop_store(&idx.store_id)?;
            delete_config(self, &idx.name)?;
        }

        self.kv().drop_store(&info.store_id)?;
        delete_config(self, name)?;

        if let Some(seq) = &info.docid_sequence {
            self.drop_sequence(seq)?;
        }
        debug!(table = %name, "dropped table");
        Ok(())
    }

    /// Creates an empty index. The caller populates it with
    /// [`Transaction::reindex`].
    pub fn create_index(&self, mut info: IndexInfo) -> Result<()> {
        self.check_cancelled()?;
        if !self.is_writable() {
            return Err(Error::TxReadOnly.into());
        }
        check_user_name(&info.name)?;

        match read_config(self, &info.table)? {
            Some(doc) if config_kind(&doc) == "table" => {}
            _ => return Err(Error::NotFound(info.table.clone()).into()),
        }
        if read_config(self, &info.name)?.is_some() {
            return Err(Error::AlreadyExists(info.name.clone()).into());
        }

        info.store_id = [b"i_", info.name.as_bytes()].concat();
        self.kv().create_store(&info.store_id)?;
        write_config(self, &info.name, &info.to_document())?;
        debug!(index = %info.name, table = %info.table, "created index");
        Ok(())
    }

    /// Opens an index. Fails with `NotFound`.
    pub fn index(&self, name: &str) -> Result<Index> {
        let doc = match read_config(self, name)? {
            Some(doc) if config_kind(&doc) == "index" => doc,
            _ => return Err(Error::NotFound(name.to_string()).into()),
        };
        let info = IndexInfo::from_document(&doc)?;
        let store = self.kv().get_store(&info.store_id)?;
        Ok(Index::new(store, info))
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        self.check_cancelled()?;
        if !self.is_writable() {
            return Err(Error::TxReadOnly.into());
        }
        let doc = match read_config(self, name)? {
            Some(doc) if config_kind(&doc) == "index" => doc,
            _ => return Err(Error::NotFound(name.to_string()).into()),
        };
        let info = IndexInfo::from_document(&doc)?;
        self.kv().drop_store(&info.store_id)?;
        delete_config(self, name)?;
        debug!(index = %name, "dropped index");
        Ok(())
    }

    /// Rebuilds an index from the current contents of its table.
    pub fn reindex(&self, name: &str) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::TxReadOnly.into());
        }
        let index = self.index(name)?;
        let table = self.table(&index.info.table)?;

        index.truncate()?;
        table.iterate(&mut |key, doc| {
            let v = index.info.path.get_from(doc).unwrap_or(Value::Null);
            index.insert(&v, key)
        })?;
        debug!(index = %name, "reindexed");
        Ok(())
    }

    /// Definitions of every index on `table`, in index-name order.
    pub fn list_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let mut out = Vec::new();
        scan_config(self, &mut |doc| {
            if config_kind(doc) == "index" {
                let info = IndexInfo::from_document(doc)?;
                if info.table == table {
                    out.push(info);
                }
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Opens every index on `table`.
    pub(crate) fn table_indexes(&self, table: &str) -> Result<Vec<Index>> {
        self.list_indexes(table)?
            .into_iter()
            .map(|info| {
                let store = self.kv().get_store(&info.store_id)?;
                Ok(Index::new(store, info))
            })
            .collect()
    }

    pub fn create_sequence(&self, info: SequenceInfo) -> Result<()> {
        check_user_name(&info.name)?;
        self.create_sequence_unchecked(info)
    }

    fn create_sequence_unchecked(&self, info: SequenceInfo) -> Result<()> {
        self.check_cancelled()?;
        if !self.is_writable() {
            return Err(Error::TxReadOnly.into());
        }
        info.validate()?;
        if read_config(self, &info.name)?.is_some() {
            return Err(Error::AlreadyExists(info.name.clone()).into());
        }
        write_config(self, &info.name, &info.to_document())?;
        sequence::init_state(self, &info.name)?;
        debug!(sequence = %info.name, "created sequence");
        Ok(())
    }

    /// Definition of a sequence. Fails with `NotFound`.
    pub fn sequence_info(&self, name: &str) -> Result<SequenceInfo> {
        match read_config(self, name)? {
            Some(doc) if config_kind(&doc) == "sequence" => SequenceInfo::from_document(&doc),
            _ => Err(Error::NotFound(name.to_string()).into()),
        }
    }

    pub fn drop_sequence(&self, name: &str) -> Result<()> {
        self.check_cancelled()?;
        if !self.is_writable() {
            return Err(Error::TxReadOnly.into());
        }
        match read_config(self, name)? {
            Some(doc) if config_kind(&doc) == "sequence" => {}
            _ => return Err(Error::NotFound(name.to_string()).into()),
        }
        delete_config(self, name)?;
        sequence::drop_state(self, name)?;
        debug!(sequence = %name, "dropped sequence");
        Ok(())
    }
}
