//! # Database
//!
//! The public entry point. A [`Database`] owns the key-value engine, the
//! document codec, and the shared sequence cache; every operation runs
//! under a [`Transaction`].
//!
//! At most one writable transaction is active at a time (the engine's
//! writer latch blocks a second writer, with no timeout); read
//! transactions may run concurrently and observe the last committed
//! snapshot. Transactions must be closed with [`Transaction::commit`] or
//! [`Transaction::rollback`]; dropping an open transaction behaves like a
//! rollback.

use crate::catalog::sequence::SequenceState;
use crate::document::{BinaryCodec, Codec, FieldBuffer, Value};
use crate::errors::Error;
use crate::kv::{Engine, KvTransaction};
use crate::query::{Output, Statement};
use eyre::{bail, Result};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cooperative cancellation handle, checked between pipeline rows and at
/// store boundaries. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        Ok(())
    }
}

/// A statement parameter, positional or named.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub value: Value,
}

impl Param {
    pub fn positional(value: Value) -> Param {
        Param { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Value) -> Param {
        Param {
            name: Some(name.into()),
            value,
        }
    }
}

/// An embeddable document database over an ordered key-value engine.
pub struct Database {
    engine: Arc<dyn Engine>,
    codec: Arc<dyn Codec>,
    sequences: Mutex<HashMap<String, SequenceState>>,
}

impl Database {
    /// Opens a database over `engine` with the bundled document codec,
    /// creating the reserved stores on first open.
    pub fn new(engine: impl Engine) -> Result<Database> {
        Database::with_engine(Arc::new(engine))
    }

    /// Opens a database over a shared engine handle.
    pub fn with_engine(engine: Arc<dyn Engine>) -> Result<Database> {
        let db = Database {
            engine,
            codec: Arc::new(BinaryCodec),
            sequences: Mutex::new(HashMap::new()),
        };
        let tx = db.begin(true)?;
        crate::catalog::bootstrap(&tx)?;
        tx.commit()?;
        Ok(db)
    }

    /// Hands the engine back, e.g. to reopen the same data later.
    pub fn into_engine(self) -> Arc<dyn Engine> {
        self.engine
    }

    /// Starts a transaction.
    pub fn begin(&self, writable: bool) -> Result<Transaction<'_>> {
        self.begin_with(writable, Cancellation::default())
    }

    /// Starts a transaction carrying a cancellation handle.
    pub fn begin_with(&self, writable: bool, cancel: Cancellation) -> Result<Transaction<'_>> {
        let kv = self.engine.begin(writable)?;
        Ok(Transaction {
            db: self,
            kv,
            writable,
            cancel,
            touched_sequences: RefCell::new(Vec::new()),
            committed: Cell::new(false),
        })
    }

    /// Runs one statement under an auto-committed transaction: read-only
    /// statements run under a read transaction, everything else under the
    /// writable one. Errors roll the transaction back.
    pub fn execute(&self, stmt: Statement, params: &[Param]) -> Result<Output> {
        self.execute_with(stmt, params, Cancellation::default())
    }

    pub fn execute_with(
        &self,
        stmt: Statement,
        params: &[Param],
        cancel: Cancellation,
    ) -> Result<Output> {
        let tx = self.begin_with(!stmt.is_read_only(), cancel)?;
        match tx.execute(&stmt, params) {
            Ok(out) => {
                tx.commit()?;
                Ok(out)
            }
            Err(err) => {
                let _ = tx.rollback();
                Err(err)
            }
        }
    }

    /// Runs a row-producing statement and materializes the result.
    pub fn query(&self, stmt: Statement, params: &[Param]) -> Result<Vec<FieldBuffer>> {
        match self.execute(stmt, params)? {
            Output::Rows(rows) => Ok(rows),
            other => bail!("statement produced {:?} instead of rows", other),
        }
    }

    pub(crate) fn sequence_states(&self) -> &Mutex<HashMap<String, SequenceState>> {
        &self.sequences
    }

    pub(crate) fn forget_sequence(&self, name: &str) {
        self.sequences.lock().remove(name);
    }

    fn discard_sequences(&self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let mut states = self.sequences.lock();
        for name in names {
            states.remove(name);
        }
    }
}

/// A transaction over the database: the KV transaction, the catalog view,
/// and the sequence cache all hang off it.
pub struct Transaction<'db> {
    db: &'db Database,
    kv: Box<dyn KvTransaction>,
    writable: bool,
    cancel: Cancellation,
    touched_sequences: RefCell<Vec<String>>,
    committed: Cell<bool>,
}

impl<'db> Transaction<'db> {
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn commit(mut self) -> Result<()> {
        self.kv.commit()?;
        self.committed.set(true);
        debug!(writable = self.writable, "transaction committed");
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.kv.rollback()?;
        debug!(writable = self.writable, "transaction rolled back");
        Ok(())
    }

    pub(crate) fn kv(&self) -> &dyn KvTransaction {
        self.kv.as_ref()
    }

    pub(crate) fn db(&self) -> &'db Database {
        self.db
    }

    pub(crate) fn codec(&self) -> &dyn Codec {
        self.db.codec.as_ref()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    pub(crate) fn record_sequence_touch(&self, name: &str) {
        let mut touched = self.touched_sequences.borrow_mut();
        if !touched.iter().any(|n| n == name) {
            touched.push(name.to_string());
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        // anything but a commit discards the cached sequence values, so
        // the next transaction re-leases from the persisted high-water
        // mark
        if !self.committed.get() {
            self.db.discard_sequences(&self.touched_sequences.borrow());
        }
    }
}
