//! # Document Model
//!
//! A document is an ordered sequence of named fields whose values are
//! [`Value`] trees. The [`Document`] trait is a capability: storage-backed
//! documents (lazily decoded from the codec), in-memory buffers, and
//! projection masks all implement it, and downstream consumers never
//! distinguish them.
//!
//! [`FieldBuffer`] is the owned, mutable implementation. It preserves field
//! insertion order and is the target of all path-based mutation
//! ([`FieldBuffer::set`], [`FieldBuffer::delete`]).

pub mod codec;
pub mod json;
pub mod path;
pub mod value;

pub use codec::{BinaryCodec, Codec, EncodedDocument};
pub use path::{Path, PathFragment};
pub use value::{Value, ValueType};

use crate::errors::Error;
use eyre::Result;

/// Read capability shared by every document representation.
pub trait Document {
    /// Returns the value of a top-level field, or `FieldNotFound`.
    fn get_by_field(&self, field: &str) -> Result<Value>;

    /// Calls `f` for each top-level field in order.
    fn iterate(&self, f: &mut dyn FnMut(&str, &Value) -> Result<()>) -> Result<()>;
}

/// An owned document: ordered `(name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldBuffer {
    fields: Vec<(String, Value)>,
}

impl FieldBuffer {
    pub fn new() -> FieldBuffer {
        FieldBuffer::default()
    }

    /// Appends a field, builder style. Does not check for duplicates.
    pub fn add(mut self, name: impl Into<String>, value: Value) -> FieldBuffer {
        self.fields.push((name.into(), value));
        self
    }

    /// Appends a field in place.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replaces an existing field in place, preserving its position.
    pub fn replace(&mut self, name: &str, value: Value) -> Result<()> {
        match self.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::FieldNotFound.into()),
        }
    }

    /// Removes a field by name, preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        match self.fields.iter().position(|(n, _)| n == name) {
            Some(i) => {
                self.fields.remove(i);
                Ok(())
            }
            None => Err(Error::FieldNotFound.into()),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Deep-copies any document into an owned buffer.
    pub fn copy_from(d: &dyn Document) -> Result<FieldBuffer> {
        let mut fb = FieldBuffer::new();
        d.iterate(&mut |name, value| {
            fb.push(name, value.clone());
            Ok(())
        })?;
        Ok(fb)
    }
}

impl Document for FieldBuffer {
    fn get_by_field(&self, field: &str) -> Result<Value> {
        self.get(field)
            .cloned()
            .ok_or_else(|| Error::FieldNotFound.into())
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, &Value) -> Result<()>) -> Result<()> {
        for (name, value) in &self.fields {
            f(name, value)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for FieldBuffer {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> FieldBuffer {
        FieldBuffer {
            fields: iter.into_iter().collect(),
        }
    }
}

/// An owned array of values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueBuffer {
    values: Vec<Value>,
}

impl ValueBuffer {
    pub fn new() -> ValueBuffer {
        ValueBuffer::default()
    }

    /// Appends a value. This is the only way an array grows: `set` on an
    /// out-of-range index is rejected.
    pub fn append(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    pub fn replace(&mut self, index: usize, value: Value) -> Result<()> {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds.into()),
        }
    }

    pub fn remove(&mut self, index: usize) -> Result<()> {
        if index >= self.values.len() {
            return Err(Error::IndexOutOfBounds.into());
        }
        self.values.remove(index);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl FromIterator<Value> for ValueBuffer {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> ValueBuffer {
        ValueBuffer {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_buffer_preserves_insertion_order() {
        let fb = FieldBuffer::new()
            .add("z", Value::Integer(1))
            .add("a", Value::Integer(2))
            .add("m", Value::Integer(3));

        let names: Vec<&str> = fb.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn replace_keeps_field_position() {
        let mut fb = FieldBuffer::new()
            .add("a", Value::Integer(1))
            .add("b", Value::Integer(2));

        fb.replace("a", Value::Text("one".into())).unwrap();

        let names: Vec<&str> = fb.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(fb.get("a"), Some(&Value::Text("one".into())));
    }

    #[test]
    fn copy_from_is_a_deep_field_for_field_copy() {
        let nested = FieldBuffer::new().add("x", Value::Integer(1));
        let fb = FieldBuffer::new()
            .add("doc", Value::Document(nested))
            .add("n", Value::Null);

        let copy = FieldBuffer::copy_from(&fb).unwrap();
        assert_eq!(copy, fb);
    }

    #[test]
    fn get_by_field_on_missing_field_is_field_not_found() {
        let fb = FieldBuffer::new().add("a", Value::Integer(1));
        let err = fb.get_by_field("b").unwrap_err();
        assert!(crate::errors::Error::FieldNotFound.is(&err));
    }
}
