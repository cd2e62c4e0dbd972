//! # Catalog Metadata
//!
//! Definitions of tables, indexes, and sequences. These are persisted in
//! the `__config` store as documents encoded through the document codec,
//! keyed by object name, with a `kind` field discriminating the three
//! shapes.

use crate::document::{FieldBuffer, Path, Value, ValueType};
use eyre::{bail, ensure, Result};

/// A declared constraint on one path of a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldConstraint {
    pub path: Path,
    pub ty: Option<ValueType>,
    pub is_primary_key: bool,
    pub is_not_null: bool,
    pub is_unique: bool,
    /// Constant default value, evaluated at DDL time.
    pub default_value: Option<Value>,
}

impl FieldConstraint {
    pub fn new(path: Path) -> FieldConstraint {
        FieldConstraint {
            path,
            ..<FieldConstraint as Default>::default()
        }
    }

    pub fn typed(mut self, ty: ValueType) -> FieldConstraint {
        self.ty = Some(ty);
        self
    }

    pub fn primary_key(mut self) -> FieldConstraint {
        self.is_primary_key = true;
        self
    }

    pub fn not_null(mut self) -> FieldConstraint {
        self.is_not_null = true;
        self
    }

    pub fn unique(mut self) -> FieldConstraint {
        self.is_unique = true;
        self
    }

    pub fn default(mut self, v: Value) -> FieldConstraint {
        self.default_value = Some(v);
        self
    }

    fn to_document(&self) -> FieldBuffer {
        let mut fb = FieldBuffer::new().add("path", Value::Text(self.path.to_string()));
        if let Some(ty) = self.ty {
            fb.push("type", Value::Text(ty.name().to_string()));
        }
        fb.push("primary_key", Value::Bool(self.is_primary_key));
        fb.push("not_null", Value::Bool(self.is_not_null));
        fb.push("unique", Value::Bool(self.is_unique));
        if let Some(dv) = &self.default_value {
            fb.push("default", dv.clone());
        }
        fb
    }

    fn from_document(fb: &FieldBuffer) -> Result<FieldConstraint> {
        Ok(FieldConstraint {
            path: required_path(fb, "path")?,
            ty: optional_type(fb, "type")?,
            is_primary_key: bool_field(fb, "primary_key"),
            is_not_null: bool_field(fb, "not_null"),
            is_unique: bool_field(fb, "unique"),
            default_value: fb.get("default").cloned(),
        })
    }
}

/// Definition of a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableInfo {
    pub name: String,
    /// Opaque id of the KV store holding the table's documents.
    pub store_id: Vec<u8>,
    pub read_only: bool,
    /// Constraints in declaration order.
    pub constraints: Vec<FieldConstraint>,
    /// Name of the implicit docid sequence, when no primary key is
    /// declared.
    pub docid_sequence: Option<String>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> TableInfo {
        TableInfo {
            name: name.into(),
            ..TableInfo::default()
        }
    }

    pub fn with_constraint(mut self, c: FieldConstraint) -> TableInfo {
        self.constraints.push(c);
        self
    }

    pub fn primary_key(&self) -> Option<&FieldConstraint> {
        self.constraints.iter().find(|c| c.is_primary_key)
    }

    /// Checks structural invariants: at most one primary key, and no pair
    /// of constraint paths overlapping in a type-incompatible way (a
    /// declared scalar cannot have constrained sub-paths).
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.is_empty(), "table name cannot be empty");

        let pk_count = self.constraints.iter().filter(|c| c.is_primary_key).count();
        ensure!(
            pk_count <= 1,
            "table {} declares {} primary keys",
            self.name,
            pk_count
        );

        for a in &self.constraints {
            ensure!(!a.path.is_empty(), "constraint path cannot be empty");
            for b in &self.constraints {
                if a.path.is_prefix_of(&b.path) {
                    match a.ty {
                        None | Some(ValueType::Document) | Some(ValueType::Array) => {}
                        Some(ty) => bail!(
                            "constraint on {} conflicts with {} declared as {}",
                            b.path,
                            a.path,
                            ty
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn to_document(&self) -> FieldBuffer {
        let constraints: crate::document::ValueBuffer = self
            .constraints
            .iter()
            .map(|c| Value::Document(c.to_document()))
            .collect();

        let mut fb = FieldBuffer::new()
            .add("name", Value::Text(self.name.clone()))
            .add("kind", Value::Text("table".into()))
            .add("store_id", Value::Blob(self.store_id.clone()))
            .add("read_only", Value::Bool(self.read_only))
            .add("constraints", Value::Array(constraints));
        if let Some(seq) = &self.docid_sequence {
            fb.push("docid_sequence", Value::Text(seq.clone()));
        }
        fb
    }

    pub(crate) fn from_document(fb: &FieldBuffer) -> Result<TableInfo> {
        let constraints = match fb.get("constraints") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::Document(d) => FieldConstraint::from_document(d),
                    other => bail!("malformed constraint entry of type {}", other.type_of()),
                })
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(TableInfo {
            name: required_text(fb, "name")?,
            store_id: required_blob(fb, "store_id")?,
            read_only: bool_field(fb, "read_only"),
            constraints,
            docid_sequence: optional_text(fb, "docid_sequence"),
        })
    }
}

/// Definition of an index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexInfo {
    pub name: String,
    pub table: String,
    pub store_id: Vec<u8>,
    pub path: Path,
    pub unique: bool,
    /// Declared value type; values are cast to it before encoding.
    pub ty: Option<ValueType>,
    /// Set when the index was created by a table constraint.
    pub owner_path: Option<Path>,
}

impl IndexInfo {
    pub fn new(name: impl Into<String>, table: impl Into<String>, path: Path) -> IndexInfo {
        IndexInfo {
            name: name.into(),
            table: table.into(),
            path,
            ..IndexInfo::default()
        }
    }

    pub fn unique(mut self) -> IndexInfo {
        self.unique = true;
        self
    }

    pub(crate) fn to_document(&self) -> FieldBuffer {
        let mut fb = FieldBuffer::new()
            .add("name", Value::Text(self.name.clone()))
            .add("kind", Value::Text("index".into()))
            .add("table", Value::Text(self.table.clone()))
            .add("store_id", Value::Blob(self.store_id.clone()))
            .add("path", Value::Text(self.path.to_string()))
            .add("unique", Value::Bool(self.unique));
        if let Some(ty) = self.ty {
            fb.push("type", Value::Text(ty.name().to_string()));
        }
        if let Some(p) = &self.owner_path {
            fb.push("owner_path", Value::Text(p.to_string()));
        }
        fb
    }

    pub(crate) fn from_document(fb: &FieldBuffer) -> Result<IndexInfo> {
        Ok(IndexInfo {
            name: required_text(fb, "name")?,
            table: required_text(fb, "table")?,
            store_id: required_blob(fb, "store_id")?,
            path: required_path(fb, "path")?,
            unique: bool_field(fb, "unique"),
            ty: optional_type(fb, "type")?,
            owner_path: match optional_text(fb, "owner_path") {
                Some(s) => Some(s.parse()?),
                None => None,
            },
        })
    }
}

/// Definition of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceInfo {
    pub name: String,
    pub increment_by: i64,
    pub min: i64,
    pub max: i64,
    pub start: i64,
    /// Number of values pre-allocated per persisted lease.
    pub cache: u64,
    pub cycle: bool,
    pub owner_table: Option<String>,
    pub owner_path: Option<Path>,
}

impl SequenceInfo {
    /// A sequence with the SQL defaults for the given direction:
    /// ascending sequences run 1..=i64::MAX from 1, descending ones
    /// i64::MIN..=-1 from -1.
    pub fn with_defaults(name: impl Into<String>, increment_by: i64) -> SequenceInfo {
        let asc = increment_by > 0;
        SequenceInfo {
            name: name.into(),
            increment_by,
            min: if asc { 1 } else { i64::MIN },
            max: if asc { i64::MAX } else { -1 },
            start: if asc { 1 } else { -1 },
            cache: 1,
            cycle: false,
            owner_table: None,
            owner_path: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.is_empty(), "sequence name cannot be empty");
        ensure!(self.increment_by != 0, "INCREMENT BY cannot be zero");
        ensure!(
            self.min <= self.max,
            "MINVALUE {} is above MAXVALUE {}",
            self.min,
            self.max
        );
        ensure!(
            self.start >= self.min && self.start <= self.max,
            "START WITH {} is outside [{}, {}]",
            self.start,
            self.min,
            self.max
        );
        ensure!(self.cache >= 1, "CACHE must be at least 1");
        Ok(())
    }

    pub(crate) fn to_document(&self) -> FieldBuffer {
        let mut fb = FieldBuffer::new()
            .add("name", Value::Text(self.name.clone()))
            .add("kind", Value::Text("sequence".into()))
            .add("increment_by", Value::Integer(self.increment_by))
            .add("min", Value::Integer(self.min))
            .add("max", Value::Integer(self.max))
            .add("start", Value::Integer(self.start))
            .add("cache", Value::Integer(self.cache as i64))
            .add("cycle", Value::Bool(self.cycle));
        if let Some(t) = &self.owner_table {
            fb.push("owner_table", Value::Text(t.clone()));
        }
        if let Some(p) = &self.owner_path {
            fb.push("owner_path", Value::Text(p.to_string()));
        }
        fb
    }

    pub(crate) fn from_document(fb: &FieldBuffer) -> Result<SequenceInfo> {
        Ok(SequenceInfo {
            name: required_text(fb, "name")?,
            increment_by: required_int(fb, "increment_by")?,
            min: required_int(fb, "min")?,
            max: required_int(fb, "max")?,
            start: required_int(fb, "start")?,
            cache: required_int(fb, "cache")? as u64,
            cycle: bool_field(fb, "cycle"),
            owner_table: optional_text(fb, "owner_table"),
            owner_path: match optional_text(fb, "owner_path") {
                Some(s) => Some(s.parse()?),
                None => None,
            },
        })
    }
}

fn required_text(fb: &FieldBuffer, field: &str) -> Result<String> {
    match fb.get(field) {
        Some(Value::Text(s)) => Ok(s.clone()),
        _ => bail!("catalog document is missing text field {:?}", field),
    }
}

fn optional_text(fb: &FieldBuffer, field: &str) -> Option<String> {
    match fb.get(field) {
        Some(Value::Text(s)) => Some(s.clone()),
        _ => None,
    }
}

fn required_blob(fb: &FieldBuffer, field: &str) -> Result<Vec<u8>> {
    match fb.get(field) {
        Some(Value::Blob(b)) => Ok(b.clone()),
        _ => bail!("catalog document is missing blob field {:?}", field),
    }
}

fn required_int(fb: &FieldBuffer, field: &str) -> Result<i64> {
    match fb.get(field) {
        Some(Value::Integer(i)) => Ok(*i),
        _ => bail!("catalog document is missing integer field {:?}", field),
    }
}

fn required_path(fb: &FieldBuffer, field: &str) -> Result<Path> {
    required_text(fb, field)?.parse()
}

fn optional_type(fb: &FieldBuffer, field: &str) -> Result<Option<ValueType>> {
    match fb.get(field) {
        Some(Value::Text(s)) => match ValueType::from_name(s) {
            Some(ty) => Ok(Some(ty)),
            None => bail!("unknown type name {:?} in catalog document", s),
        },
        _ => Ok(None),
    }
}

fn bool_field(fb: &FieldBuffer, field: &str) -> bool {
    matches!(fb.get(field), Some(Value::Bool(true)))
}
