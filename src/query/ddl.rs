//! # DDL Statements
//!
//! CREATE/DROP for tables, indexes, and sequences, plus REINDEX. DEFAULT
//! expressions are evaluated here, once, with an empty environment; a
//! UNIQUE column constraint creates its backing unique index alongside
//! the table.

use super::Output;
use crate::catalog::{FieldConstraint, IndexInfo, SequenceInfo, TableInfo};
use crate::database::Transaction;
use crate::document::{Path, ValueType};
use crate::errors::Error;
use crate::expr::{Environment, Expr};
use eyre::Result;

/// One column constraint as parsed from DDL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintDef {
    pub path: Path,
    pub ty: Option<ValueType>,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub default: Option<Expr>,
}

impl ConstraintDef {
    pub fn new(path: &str) -> ConstraintDef {
        ConstraintDef {
            path: path.parse().expect("valid constraint path"),
            ..<ConstraintDef as Default>::default()
        }
    }

    pub fn typed(mut self, ty: ValueType) -> ConstraintDef {
        self.ty = Some(ty);
        self
    }

    pub fn primary_key(mut self) -> ConstraintDef {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> ConstraintDef {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> ConstraintDef {
        self.unique = true;
        self
    }

    pub fn default(mut self, e: Expr) -> ConstraintDef {
        self.default = Some(e);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub if_not_exists: bool,
    pub name: String,
    pub constraints: Vec<ConstraintDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub if_not_exists: bool,
    pub name: String,
    pub table: String,
    pub path: Path,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSequenceStmt {
    pub if_not_exists: bool,
    pub info: SequenceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropStmt {
    pub if_exists: bool,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReindexStmt {
    pub index: String,
}

fn swallow_already_exists(result: Result<()>, swallow: bool) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(err)
            if swallow
                && matches!(err.downcast_ref::<Error>(), Some(Error::AlreadyExists(_))) =>
        {
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn swallow_not_found(result: Result<()>, swallow: bool) -> Result<Output> {
    match result {
        Ok(()) => Ok(Output::None),
        Err(err)
            if swallow && matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))) =>
        {
            Ok(Output::None)
        }
        Err(err) => Err(err),
    }
}

pub(crate) fn create_table(tx: &Transaction<'_>, stmt: &CreateTableStmt) -> Result<Output> {
    let mut info = TableInfo::new(&stmt.name);
    for def in &stmt.constraints {
        let default_value = match &def.default {
            Some(e) => Some(e.eval(&Environment::empty()).map_err(|_| {
                eyre::Report::from(Error::DefaultEvaluationFailed(def.path.to_string()))
            })?),
            None => None,
        };
        info.constraints.push(FieldConstraint {
            path: def.path.clone(),
            ty: def.ty,
            is_primary_key: def.primary_key,
            is_not_null: def.not_null,
            is_unique: def.unique,
            default_value,
        });
    }

    if !swallow_already_exists(tx.create_table(info), stmt.if_not_exists)? {
        return Ok(Output::None);
    }

    // a UNIQUE column constraint is enforced by its backing unique index
    for def in &stmt.constraints {
        if def.unique && !def.primary_key {
            let mut index = IndexInfo::new(
                format!("{}_{}_idx", stmt.name, def.path),
                &stmt.name,
                def.path.clone(),
            )
            .unique();
            index.ty = def.ty;
            index.owner_path = Some(def.path.clone());
            tx.create_index(index)?;
        }
    }
    Ok(Output::None)
}

pub(crate) fn create_index(tx: &Transaction<'_>, stmt: &CreateIndexStmt) -> Result<Output> {
    let mut info = IndexInfo::new(&stmt.name, &stmt.table, stmt.path.clone());
    info.unique = stmt.unique;

    if swallow_already_exists(tx.create_index(info), stmt.if_not_exists)? {
        // populate from the table's current contents
        tx.reindex(&stmt.name)?;
    }
    Ok(Output::None)
}

pub(crate) fn create_sequence(tx: &Transaction<'_>, stmt: &CreateSequenceStmt) -> Result<Output> {
    swallow_already_exists(tx.create_sequence(stmt.info.clone()), stmt.if_not_exists)?;
    Ok(Output::None)
}

pub(crate) fn drop_table(tx: &Transaction<'_>, stmt: &DropStmt) -> Result<Output> {
    swallow_not_found(tx.drop_table(&stmt.name), stmt.if_exists)
}

pub(crate) fn drop_index(tx: &Transaction<'_>, stmt: &DropStmt) -> Result<Output> {
    swallow_not_found(tx.drop_index(&stmt.name), stmt.if_exists)
}

pub(crate) fn drop_sequence(tx: &Transaction<'_>, stmt: &DropStmt) -> Result<Output> {
    swallow_not_found(tx.drop_sequence(&stmt.name), stmt.if_exists)
}

pub(crate) fn reindex(tx: &Transaction<'_>, stmt: &ReindexStmt) -> Result<Output> {
    tx.reindex(&stmt.index)?;
    Ok(Output::None)
}
