//! # Error Kinds
//!
//! Every fallible operation in QuillDB returns `eyre::Result`. Operations
//! whose failures callers need to distinguish attach an [`Error`] sentinel to
//! the report; everything else fails with a plain message. Sentinels are
//! recovered with [`eyre::Report::downcast_ref`]:
//!
//! ```ignore
//! match err.downcast_ref::<Error>() {
//!     Some(Error::AlreadyExists(_)) => { /* IF NOT EXISTS swallows this */ }
//!     _ => return Err(err),
//! }
//! ```
//!
//! `StreamClosed` is a control-flow sentinel used to terminate pipeline
//! iteration cleanly (LIMIT, early exit). It never reaches the caller: the
//! stream driver converts it to a successful end of iteration.

use thiserror::Error;

/// Typed error kinds surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A catalog object (table, index, sequence) does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// A catalog object with the same name already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A document with the same key already exists in the table.
    #[error("duplicate document")]
    DuplicateDocument,
    /// No document with the given key exists in the table.
    #[error("document not found")]
    DocumentNotFound,
    /// The table rejects writes.
    #[error("cannot write to read-only table")]
    ReadOnly,
    /// The table declares a primary key but the document does not carry one.
    #[error("missing primary key at path {0}")]
    PrimaryKeyMissing(String),

    /// A NOT NULL constraint was violated.
    #[error("field {0} is required and must be not null")]
    NotNull(String),
    /// A value could not be converted to the declared constraint type.
    #[error("cannot convert {0} to {1}")]
    TypeMismatch(String, String),
    /// A DEFAULT expression could not be evaluated.
    #[error("default value evaluation failed for {0}")]
    DefaultEvaluationFailed(String),

    /// A unique index already holds an entry for this value.
    #[error("duplicate key in unique index")]
    DuplicateKey,

    /// The sequence reached its bound and does not cycle.
    #[error("sequence {0} exhausted")]
    SequenceExhausted(String),
    /// Sequences can only be incremented by writable transactions.
    #[error("cannot increment sequence on read-only transaction")]
    SequenceNotWritable,

    /// A path fragment names a field the document does not have.
    #[error("field not found")]
    FieldNotFound,
    /// A path fragment indexes past the end of an array.
    #[error("array index out of bounds")]
    IndexOutOfBounds,
    /// A path traverses through a value of the wrong kind.
    #[error("invalid path")]
    PathInvalid,

    /// The named store does not exist in the key-value engine.
    #[error("store not found")]
    StoreNotFound,
    /// A store with the same id already exists.
    #[error("store already exists")]
    StoreAlreadyExists,
    /// The key does not exist in the store.
    #[error("key not found")]
    KeyNotFound,
    /// A mutating call was issued on a read-only transaction.
    #[error("transaction is read-only")]
    TxReadOnly,
    /// The engine detected a write conflict at commit.
    #[error("write conflict")]
    Conflict,

    /// Clean termination sentinel for stream iteration. Never surfaced.
    #[error("stream closed")]
    StreamClosed,
    /// The cancellation handle fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Reports whether `err` carries this exact sentinel.
    pub fn is(&self, err: &eyre::Report) -> bool {
        err.downcast_ref::<Error>() == Some(self)
    }

    /// Reports whether `err` is the clean stream-termination sentinel.
    pub fn is_stream_closed(err: &eyre::Report) -> bool {
        Error::StreamClosed.is(err)
    }
}
