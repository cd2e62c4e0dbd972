//! # QuillDB — Embeddable Document Database
//!
//! QuillDB stores schemaless documents keyed by primary key or
//! auto-generated docid, indexes their fields, and executes a SQL-like
//! dialect through a streaming dataflow planner over an abstract ordered
//! key-value engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │       Public API (Database)          │
//! ├──────────────────────────────────────┤
//! │  Statements (query) │ Planner        │
//! ├──────────────────────────────────────┤
//! │  Stream Operators │ Expressions/Env  │
//! ├──────────────────────────────────────┤
//! │  Catalog │ Table │ Index │ Sequence  │
//! ├──────────────────────────────────────┤
//! │  Document Model │ Codec │ Key Codec  │
//! ├──────────────────────────────────────┤
//! │   KV Abstraction (ordered stores)    │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use quilldb::{Database, MemoryEngine, Statement};
//!
//! let db = Database::new(MemoryEngine::new())?;
//! db.execute(create_table, &[])?;          // CREATE TABLE …
//! db.execute(insert, &[])?;                // INSERT INTO …
//! let rows = db.query(select, &[])?;       // SELECT …
//! ```
//!
//! The SQL text itself is parsed by an external front end; the crate
//! consumes the statement AST ([`Statement`]) and executes it: every DML
//! statement compiles to a pull pipeline of stream operators, the
//! rule-based optimizer rewrites filters over indexed paths into index
//! scans, and the pipeline runs against the catalog and storage mapped
//! onto the key-value engine.
//!
//! ## Module Overview
//!
//! - [`document`]: value trees, paths, JSON, the self-describing codec
//! - [`encoding`]: order-preserving key encoding, varints
//! - [`kv`]: the engine abstraction and the in-memory engine
//! - [`catalog`]: tables, indexes, sequences and their persistence
//! - [`expr`]: expressions and the per-row evaluation environment
//! - [`stream`]: pull-based operator pipelines
//! - [`planner`]: the rule-based optimizer
//! - [`query`]: the statement AST and its execution

pub mod catalog;
pub mod database;
pub mod document;
pub mod encoding;
pub mod errors;
pub mod expr;
pub mod kv;
pub mod planner;
pub mod query;
pub mod stream;

pub use catalog::{FieldConstraint, IndexInfo, SequenceInfo, TableInfo};
pub use database::{Cancellation, Database, Param, Transaction};
pub use document::{Document, FieldBuffer, Path, Value, ValueType};
pub use errors::Error;
pub use kv::MemoryEngine;
pub use query::{Output, Statement};
