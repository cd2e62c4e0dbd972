//! # Runtime Value Representation
//!
//! `Value` is the tagged union stored in documents and produced by
//! expression evaluation. Variants nest arbitrarily: arrays hold values,
//! documents hold ordered named fields.
//!
//! ## Comparison Semantics
//!
//! - NULL compared to anything is UNKNOWN: [`Value::compare`] must only be
//!   called on non-null operands and returns `None` for incomparable types;
//!   the three-valued logic on top of it lives in `expr::comparison`.
//! - Integer vs Double compares by mathematical value (integer promoted to
//!   double for the comparison only, never on storage).
//! - Text compares by code unit, Blob by byte.
//!
//! ## Casting
//!
//! [`Value::cast_as`] implements the conversions applied by declared field
//! constraint types: exact integer/double conversions, boolean/integer
//! bridging, and text parsing. A failed cast is a `TypeMismatch`.

use super::{FieldBuffer, ValueBuffer};
use crate::errors::Error;
use eyre::Result;
use std::cmp::Ordering;
use std::fmt;

/// The type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    Integer,
    Double,
    Text,
    Blob,
    Array,
    Document,
}

impl ValueType {
    /// Canonical lowercase name, used by the catalog and `type_of()`.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Integer => "integer",
            ValueType::Double => "double",
            ValueType::Text => "text",
            ValueType::Blob => "blob",
            ValueType::Array => "array",
            ValueType::Document => "document",
        }
    }

    /// Parses a canonical name back into a type tag.
    pub fn from_name(name: &str) -> Option<ValueType> {
        Some(match name {
            "null" => ValueType::Null,
            "bool" => ValueType::Bool,
            "integer" => ValueType::Integer,
            "double" => ValueType::Double,
            "text" => ValueType::Text,
            "blob" => ValueType::Blob,
            "array" => ValueType::Array,
            "document" => ValueType::Document,
            _ => return None,
        })
    }

    /// Resolves a DDL type name, including the aliases accepted by the SQL
    /// surface. Size parameters like `VARCHAR(255)` are handled by the
    /// parser; this only sees the bare keyword.
    pub fn parse_ddl(name: &str) -> Option<ValueType> {
        let upper = name.to_ascii_uppercase();
        Some(match upper.as_str() {
            "INTEGER" | "INT" | "INT2" | "INT8" | "TINYINT" | "SMALLINT" | "MEDIUMINT"
            | "BIGINT" => ValueType::Integer,
            "DOUBLE" | "REAL" | "DOUBLE PRECISION" => ValueType::Double,
            "BOOL" | "BOOLEAN" => ValueType::Bool,
            "TEXT" | "VARCHAR" | "CHARACTER" => ValueType::Text,
            "BLOB" | "BYTES" => ValueType::Blob,
            "ARRAY" => ValueType::Array,
            "DOCUMENT" => ValueType::Document,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A document field value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Array(ValueBuffer),
    Document(FieldBuffer),
}

impl Value {
    pub fn type_of(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::Text(_) => ValueType::Text,
            Value::Blob(_) => ValueType::Blob,
            Value::Array(_) => ValueType::Array,
            Value::Document(_) => ValueType::Document,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by Filter: NULL and zero values are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Blob(b) => !b.is_empty(),
            Value::Array(a) => a.len() > 0,
            Value::Document(d) => d.len() > 0,
        }
    }

    /// Orders two non-null values. Returns `None` when the operands are of
    /// incompatible types (every comparison on them is false) or when a NaN
    /// is involved. Integer and Double interleave by mathematical value.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;

        match (self, other) {
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Integer(a), Double(b)) => (*a as f64).partial_cmp(b),
            (Double(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Text(a), Text(b)) => Some(a.cmp(b)),
            (Blob(a), Blob(b)) => Some(a.cmp(b)),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    if x.is_null() || y.is_null() {
                        return None;
                    }
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Document(a), Document(b)) => {
                for ((fa, va), (fb, vb)) in a.fields().zip(b.fields()) {
                    match fa.cmp(fb) {
                        Ordering::Equal => {}
                        ord => return Some(ord),
                    }
                    if va.is_null() || vb.is_null() {
                        return None;
                    }
                    match va.compare(vb)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// Converts this value to the target type. Identity casts always
    /// succeed; everything else follows the table below.
    ///
    /// | from \ to | integer | double | bool | text |
    /// |-----------|---------|--------|------|------|
    /// | integer   | ✓       | ✓      | ≠0   | —    |
    /// | double    | exact   | ✓      | —    | —    |
    /// | bool      | 0/1     | —      | ✓    | —    |
    /// | text      | parse   | parse  | —    | ✓    |
    pub fn cast_as(&self, target: ValueType) -> Result<Value> {
        if self.type_of() == target {
            return Ok(self.clone());
        }

        let mismatch = || -> eyre::Report {
            Error::TypeMismatch(self.type_of().name().to_string(), target.name().to_string())
                .into()
        };

        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Integer(i), ValueType::Double) => Ok(Value::Double(*i as f64)),
            (Value::Integer(i), ValueType::Bool) => Ok(Value::Bool(*i != 0)),
            (Value::Double(d), ValueType::Integer) => {
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                    Ok(Value::Integer(*d as i64))
                } else {
                    Err(mismatch())
                }
            }
            (Value::Bool(b), ValueType::Integer) => Ok(Value::Integer(i64::from(*b))),
            (Value::Text(s), ValueType::Integer) => {
                s.trim().parse::<i64>().map(Value::Integer).map_err(|_| mismatch())
            }
            (Value::Text(s), ValueType::Double) => {
                s.trim().parse::<f64>().map(Value::Double).map_err(|_| mismatch())
            }
            _ => Err(mismatch()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&FieldBuffer> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ValueBuffer> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Renders the value in its JSON form; used by EXPLAIN and error
    /// messages, not by storage.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::json::encode_value(self))
    }
}
