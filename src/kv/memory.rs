//! # In-Memory Engine
//!
//! Ordered-map engine used by tests and as the reference implementation of
//! the engine contract. Transactions take a full snapshot of the engine
//! state when they begin:
//!
//! - read transactions see the last committed state, unaffected by any
//!   concurrent writer (snapshot isolation);
//! - the single writable transaction mutates its snapshot privately and
//!   swaps it in atomically on commit.
//!
//! The writer latch is a `parking_lot` mutex whose guard lives inside the
//! writable transaction, so a second writer blocks until the first commits,
//! rolls back, or is dropped. Iterators copy the entries of their store at
//! creation: mutating a store while iterating it never invalidates a
//! cursor.

use super::{Engine, IteratorOptions, KvTransaction, Store, StoreIterator};
use crate::errors::Error;
use eyre::{ensure, Result};
use hashbrown::HashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct StoreData {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    next_seq: u64,
}

#[derive(Debug, Clone, Default)]
struct EngineState {
    stores: HashMap<Vec<u8>, StoreData>,
}

/// An [`Engine`] backed by ordered in-memory maps.
#[derive(Default)]
pub struct MemoryEngine {
    state: Arc<RwLock<EngineState>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryEngine {
    pub fn new() -> MemoryEngine {
        MemoryEngine::default()
    }
}

impl Engine for MemoryEngine {
    fn begin(&self, writable: bool) -> Result<Box<dyn KvTransaction>> {
        // take the latch before snapshotting so the writer sees the state
        // left by the previous writer
        let guard = writable.then(|| self.writer.lock_arc());
        let snapshot = self.state.read().clone();

        Ok(Box::new(MemTransaction {
            engine: Arc::clone(&self.state),
            tx: Arc::new(RwLock::new(snapshot)),
            writable,
            done: false,
            _latch: guard,
        }))
    }
}

struct MemTransaction {
    engine: Arc<RwLock<EngineState>>,
    tx: Arc<RwLock<EngineState>>,
    writable: bool,
    done: bool,
    _latch: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl KvTransaction for MemTransaction {
    fn writable(&self) -> bool {
        self.writable
    }

    fn commit(&mut self) -> Result<()> {
        ensure!(!self.done, "transaction already closed");
        self.done = true;
        if self.writable {
            *self.engine.write() = self.tx.read().clone();
        }
        self._latch = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        ensure!(!self.done, "transaction already closed");
        self.done = true;
        self._latch = None;
        Ok(())
    }

    fn create_store(&self, id: &[u8]) -> Result<()> {
        ensure_writable(self.writable)?;
        let mut state = self.tx.write();
        if state.stores.contains_key(id) {
            return Err(Error::StoreAlreadyExists.into());
        }
        state.stores.insert(id.to_vec(), StoreData::default());
        Ok(())
    }

    fn get_store(&self, id: &[u8]) -> Result<Box<dyn Store>> {
        let state = self.tx.read();
        if !state.stores.contains_key(id) {
            return Err(Error::StoreNotFound.into());
        }
        Ok(Box::new(MemStore {
            tx: Arc::clone(&self.tx),
            id: id.to_vec(),
            writable: self.writable,
        }))
    }

    fn drop_store(&self, id: &[u8]) -> Result<()> {
        ensure_writable(self.writable)?;
        let mut state = self.tx.write();
        if state.stores.remove(id).is_none() {
            return Err(Error::StoreNotFound.into());
        }
        Ok(())
    }
}

fn ensure_writable(writable: bool) -> Result<()> {
    if !writable {
        return Err(Error::TxReadOnly.into());
    }
    Ok(())
}

#[derive(Debug)]
struct MemStore {
    tx: Arc<RwLock<EngineState>>,
    id: Vec<u8>,
    writable: bool,
}

impl MemStore {
    fn read<T>(&self, f: impl FnOnce(&StoreData) -> Result<T>) -> Result<T> {
        let state = self.tx.read();
        match state.stores.get(&self.id) {
            Some(data) => f(data),
            None => Err(Error::StoreNotFound.into()),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        ensure_writable(self.writable)?;
        let mut state = self.tx.write();
        match state.stores.get_mut(&self.id) {
            Some(data) => f(data),
            None => Err(Error::StoreNotFound.into()),
        }
    }
}

impl Store for MemStore {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.read(|data| {
            data.entries
                .get(key)
                .cloned()
                .ok_or_else(|| Error::KeyNotFound.into())
        })
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(|data| {
            data.entries.insert(key.to_vec(), value.to_vec());
            Ok(())
        })
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.write(|data| match data.entries.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::KeyNotFound.into()),
        })
    }

    fn truncate(&self) -> Result<()> {
        self.write(|data| {
            data.entries.clear();
            Ok(())
        })
    }

    fn iterator(&self, opts: IteratorOptions) -> Result<Box<dyn StoreIterator>> {
        let entries = self.read(|data| {
            Ok(data
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>())
        })?;
        Ok(Box::new(MemIterator {
            entries,
            pos: None,
            reverse: opts.reverse,
        }))
    }

    fn next_sequence(&self) -> Result<u64> {
        self.write(|data| {
            data.next_seq += 1;
            Ok(data.next_seq)
        })
    }
}

struct MemIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
    reverse: bool,
}

impl StoreIterator for MemIterator {
    fn seek(&mut self, key: Option<&[u8]>) {
        self.pos = match (key, self.reverse) {
            (None, false) => (!self.entries.is_empty()).then_some(0),
            (None, true) => self.entries.len().checked_sub(1),
            (Some(k), false) => {
                let i = self.entries.partition_point(|(ek, _)| ek.as_slice() < k);
                (i < self.entries.len()).then_some(i)
            }
            (Some(k), true) => {
                let i = self.entries.partition_point(|(ek, _)| ek.as_slice() <= k);
                i.checked_sub(1)
            }
        };
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos.expect("iterator is valid")].0
    }

    fn value_copy(&self, buf: &mut Vec<u8>) -> Result<()> {
        let (_, v) = &self.entries[self.pos.ok_or_else(|| eyre::eyre!("iterator is not valid"))?];
        buf.clear();
        buf.extend_from_slice(v);
        Ok(())
    }

    fn next(&mut self) {
        self.pos = match self.pos {
            Some(i) if !self.reverse => (i + 1 < self.entries.len()).then_some(i + 1),
            Some(i) => i.checked_sub(1),
            None => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tx(engine: &MemoryEngine) -> Box<dyn KvTransaction> {
        engine.begin(true).unwrap()
    }

    #[test]
    fn create_store_twice_fails_with_store_already_exists() {
        let engine = MemoryEngine::new();
        let tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        let err = tx.create_store(b"s").unwrap_err();
        assert!(Error::StoreAlreadyExists.is(&err));
    }

    #[test]
    fn get_store_on_missing_store_fails_with_store_not_found() {
        let engine = MemoryEngine::new();
        let tx = write_tx(&engine);
        let err = tx.get_store(b"nope").unwrap_err();
        assert!(Error::StoreNotFound.is(&err));
    }

    #[test]
    fn mutations_on_read_only_transaction_fail_with_tx_read_only() {
        let engine = MemoryEngine::new();
        let mut tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        tx.commit().unwrap();

        let rtx = engine.begin(false).unwrap();
        let store = rtx.get_store(b"s").unwrap();
        assert!(Error::TxReadOnly.is(&store.put(b"k", b"v").unwrap_err()));
        assert!(Error::TxReadOnly.is(&store.truncate().unwrap_err()));
        assert!(Error::TxReadOnly.is(&store.next_sequence().unwrap_err()));
        assert!(Error::TxReadOnly.is(&rtx.create_store(b"t").unwrap_err()));
    }

    #[test]
    fn committed_writes_are_visible_to_later_transactions() {
        let engine = MemoryEngine::new();
        let mut tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        tx.get_store(b"s").unwrap().put(b"k", b"v").unwrap();
        tx.commit().unwrap();

        let rtx = engine.begin(false).unwrap();
        assert_eq!(rtx.get_store(b"s").unwrap().get(b"k").unwrap(), b"v");
    }

    #[test]
    fn rolled_back_writes_are_discarded() {
        let engine = MemoryEngine::new();
        let mut tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        tx.commit().unwrap();

        let mut tx = write_tx(&engine);
        tx.get_store(b"s").unwrap().put(b"k", b"v").unwrap();
        tx.rollback().unwrap();

        let rtx = engine.begin(false).unwrap();
        let err = rtx.get_store(b"s").unwrap().get(b"k").unwrap_err();
        assert!(Error::KeyNotFound.is(&err));
    }

    #[test]
    fn read_transaction_keeps_its_snapshot_while_a_writer_commits() {
        let engine = MemoryEngine::new();
        let mut tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        tx.get_store(b"s").unwrap().put(b"k", b"old").unwrap();
        tx.commit().unwrap();

        let rtx = engine.begin(false).unwrap();

        let mut wtx = write_tx(&engine);
        wtx.get_store(b"s").unwrap().put(b"k", b"new").unwrap();
        wtx.commit().unwrap();

        assert_eq!(rtx.get_store(b"s").unwrap().get(b"k").unwrap(), b"old");

        let rtx2 = engine.begin(false).unwrap();
        assert_eq!(rtx2.get_store(b"s").unwrap().get(b"k").unwrap(), b"new");
    }

    #[test]
    fn iteration_yields_keys_in_ascending_byte_order() {
        let engine = MemoryEngine::new();
        let tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        let store = tx.get_store(b"s").unwrap();
        for k in [b"b".as_slice(), b"a", b"c"] {
            store.put(k, b"").unwrap();
        }

        let mut it = store.iterator(IteratorOptions::default()).unwrap();
        it.seek(None);
        let mut keys = Vec::new();
        while it.valid() {
            keys.push(it.key().to_vec());
            it.next();
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn reverse_iteration_and_seek_position_correctly() {
        let engine = MemoryEngine::new();
        let tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        let store = tx.get_store(b"s").unwrap();
        for k in [b"a".as_slice(), b"c", b"e"] {
            store.put(k, b"").unwrap();
        }

        let mut it = store.iterator(IteratorOptions { reverse: true }).unwrap();
        it.seek(Some(b"d"));
        assert!(it.valid());
        assert_eq!(it.key(), b"c");
        it.next();
        assert_eq!(it.key(), b"a");
        it.next();
        assert!(!it.valid());

        let mut it = store.iterator(IteratorOptions::default()).unwrap();
        it.seek(Some(b"b"));
        assert_eq!(it.key(), b"c");
    }

    #[test]
    fn next_sequence_is_monotone_and_survives_commit() {
        let engine = MemoryEngine::new();
        let mut tx = write_tx(&engine);
        tx.create_store(b"s").unwrap();
        let store = tx.get_store(b"s").unwrap();
        assert_eq!(store.next_sequence().unwrap(), 1);
        assert_eq!(store.next_sequence().unwrap(), 2);
        drop(store);
        tx.commit().unwrap();

        let tx = write_tx(&engine);
        assert_eq!(tx.get_store(b"s").unwrap().next_sequence().unwrap(), 3);
    }
}
