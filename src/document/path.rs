//! # Paths
//!
//! A path addresses a sub-value inside a document: a non-empty sequence of
//! fragments, each either a field name or an array index. `a.b[0].c` is
//! `[Field("a"), Field("b"), Index(0), Field("c")]`.
//!
//! Reads treat unresolvable fragments as missing (`FieldNotFound` /
//! `IndexOutOfBounds`). Writes are stricter: every non-terminal fragment
//! must resolve to a document or array of the matching fragment kind,
//! otherwise `PathInvalid` — the value tree is never silently restructured,
//! and arrays never grow through `set`.

use super::{Document, FieldBuffer, Value};
use crate::errors::Error;
use eyre::{bail, Result};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathFragment {
    Field(String),
    Index(usize),
}

/// A non-empty sequence of fragments addressing a sub-value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    fragments: SmallVec<[PathFragment; 4]>,
}

impl Path {
    pub fn field(name: impl Into<String>) -> Path {
        Path {
            fragments: SmallVec::from_vec(vec![PathFragment::Field(name.into())]),
        }
    }

    /// Appends a field fragment, builder style.
    pub fn then_field(mut self, name: impl Into<String>) -> Path {
        self.fragments.push(PathFragment::Field(name.into()));
        self
    }

    /// Appends an index fragment, builder style.
    pub fn then_index(mut self, index: usize) -> Path {
        self.fragments.push(PathFragment::Index(index));
        self
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[PathFragment] {
        &self.fragments
    }

    /// Reports whether `self` is a strict prefix of `other`.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.len() < other.len() && other.fragments[..self.len()] == self.fragments[..]
    }

    /// Resolves the path against a document. Missing fields and
    /// out-of-range indices fail with their respective kinds; traversing
    /// into a value of the wrong kind reads as missing.
    pub fn get_from(&self, d: &dyn Document) -> Result<Value> {
        let (first, rest) = match self.fragments.split_first() {
            Some(split) => split,
            None => return Err(Error::FieldNotFound.into()),
        };

        let mut current = match first {
            PathFragment::Field(name) => d.get_by_field(name)?,
            PathFragment::Index(_) => return Err(Error::FieldNotFound.into()),
        };

        for frag in rest {
            current = match (current, frag) {
                (Value::Document(fb), PathFragment::Field(name)) => match fb.get(name) {
                    Some(v) => v.clone(),
                    None => return Err(Error::FieldNotFound.into()),
                },
                (Value::Array(vb), PathFragment::Index(i)) => match vb.get(*i) {
                    Some(v) => v.clone(),
                    None => return Err(Error::IndexOutOfBounds.into()),
                },
                (_, PathFragment::Field(_)) => return Err(Error::FieldNotFound.into()),
                (_, PathFragment::Index(_)) => return Err(Error::IndexOutOfBounds.into()),
            };
        }

        Ok(current)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frag) in self.fragments.iter().enumerate() {
            match frag {
                PathFragment::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathFragment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = eyre::Report;

    /// Parses dot/bracket notation: `a.b[0].c`.
    fn from_str(s: &str) -> Result<Path> {
        let mut fragments = SmallVec::new();
        let mut chars = s.chars().peekable();
        let mut field = String::new();
        let mut expect_field = true;

        loop {
            match chars.next() {
                Some('.') => {
                    if expect_field {
                        bail!("invalid path {:?}: empty fragment", s);
                    }
                    expect_field = true;
                }
                Some('[') => {
                    if expect_field {
                        bail!("invalid path {:?}: index without a field", s);
                    }
                    let mut digits = String::new();
                    for c in chars.by_ref() {
                        if c == ']' {
                            break;
                        }
                        digits.push(c);
                    }
                    let index: usize = digits
                        .parse()
                        .map_err(|_| eyre::eyre!("invalid path {:?}: bad index {:?}", s, digits))?;
                    fragments.push(PathFragment::Index(index));
                }
                Some(c) => {
                    if !expect_field && field.is_empty() {
                        bail!("invalid path {:?}: unexpected {:?}", s, c);
                    }
                    expect_field = false;
                    field.push(c);
                    let boundary = matches!(chars.peek(), Some('.') | Some('[') | None);
                    if boundary {
                        fragments.push(PathFragment::Field(std::mem::take(&mut field)));
                    }
                }
                None => break,
            }
        }

        if fragments.is_empty() {
            bail!("invalid path: empty");
        }
        Ok(Path { fragments })
    }
}

impl FieldBuffer {
    /// Resolves a path against this buffer.
    pub fn get_path(&self, path: &Path) -> Result<Value> {
        path.get_from(self)
    }

    /// Writes `value` at `path`. An existing target is replaced in place; a
    /// new leaf field is appended to its enclosing document. Arrays never
    /// grow through `set`.
    pub fn set(&mut self, path: &Path, value: Value) -> Result<()> {
        let (first, rest) = match path.fragments().split_first() {
            Some(split) => split,
            None => return Err(Error::PathInvalid.into()),
        };

        let name = match first {
            PathFragment::Field(name) => name,
            PathFragment::Index(_) => return Err(Error::PathInvalid.into()),
        };

        if rest.is_empty() {
            match self.get_mut(name) {
                Some(slot) => *slot = value,
                None => self.push(name.clone(), value),
            }
            return Ok(());
        }

        match self.get_mut(name) {
            Some(slot) => set_in_value(slot, rest, value),
            None => Err(Error::PathInvalid.into()),
        }
    }

    /// Removes the value at `path`, preserving the order of its siblings.
    pub fn delete(&mut self, path: &Path) -> Result<()> {
        let (first, rest) = match path.fragments().split_first() {
            Some(split) => split,
            None => return Err(Error::PathInvalid.into()),
        };

        let name = match first {
            PathFragment::Field(name) => name,
            PathFragment::Index(_) => return Err(Error::PathInvalid.into()),
        };

        if rest.is_empty() {
            return self.remove(name);
        }

        match self.get_mut(name) {
            Some(slot) => delete_in_value(slot, rest),
            None => Err(Error::FieldNotFound.into()),
        }
    }
}

fn set_in_value(v: &mut Value, frags: &[PathFragment], value: Value) -> Result<()> {
    let (first, rest) = frags.split_first().expect("non-empty fragment tail");

    match (v, first) {
        (Value::Document(fb), PathFragment::Field(name)) => {
            if rest.is_empty() {
                match fb.get_mut(name) {
                    Some(slot) => *slot = value,
                    None => fb.push(name.clone(), value),
                }
                return Ok(());
            }
            match fb.get_mut(name) {
                Some(slot) => set_in_value(slot, rest, value),
                None => Err(Error::PathInvalid.into()),
            }
        }
        (Value::Array(vb), PathFragment::Index(i)) => {
            if rest.is_empty() {
                return vb.replace(*i, value);
            }
            match vb.get_mut(*i) {
                Some(slot) => set_in_value(slot, rest, value),
                None => Err(Error::PathInvalid.into()),
            }
        }
        _ => Err(Error::PathInvalid.into()),
    }
}

fn delete_in_value(v: &mut Value, frags: &[PathFragment]) -> Result<()> {
    let (first, rest) = frags.split_first().expect("non-empty fragment tail");

    match (v, first) {
        (Value::Document(fb), PathFragment::Field(name)) => {
            if rest.is_empty() {
                return fb.remove(name);
            }
            match fb.get_mut(name) {
                Some(slot) => delete_in_value(slot, rest),
                None => Err(Error::FieldNotFound.into()),
            }
        }
        (Value::Array(vb), PathFragment::Index(i)) => {
            if rest.is_empty() {
                return vb.remove(*i);
            }
            match vb.get_mut(*i) {
                Some(slot) => delete_in_value(slot, rest),
                None => Err(Error::IndexOutOfBounds.into()),
            }
        }
        _ => Err(Error::PathInvalid.into()),
    }
}
