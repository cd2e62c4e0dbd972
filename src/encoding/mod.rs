//! # Encoding Module
//!
//! Byte-level encodings shared by storage keys and the document codec:
//!
//! - [`key`]: order-preserving encoding of typed values for primary keys
//!   and index entries
//! - [`varint`]: order-preserving variable-length integers for docids and
//!   length fields

pub mod key;
pub mod varint;
