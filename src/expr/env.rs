//! # Evaluation Environment
//!
//! The per-row context threaded through the operator pipeline: the current
//! document and its storage key, the group tag set by GroupBy, parameter
//! bindings, and the transaction. Environments form a chain of borrowed
//! frames — each operator layers a child frame over its input — and every
//! lookup walks outward until a frame provides the requested slot.

use crate::database::{Param, Transaction};
use crate::document::{Document, Value};

/// One frame of the evaluation context chain.
#[derive(Clone, Copy, Default)]
pub struct Environment<'a> {
    doc: Option<&'a dyn Document>,
    key: Option<&'a [u8]>,
    group: Option<&'a Value>,
    params: Option<&'a [Param]>,
    tx: Option<&'a Transaction<'a>>,
    outer: Option<&'a Environment<'a>>,
}

impl<'a> Environment<'a> {
    /// The root frame of a pipeline.
    pub fn root(tx: &'a Transaction<'a>, params: &'a [Param]) -> Environment<'a> {
        Environment {
            tx: Some(tx),
            params: Some(params),
            ..Environment::default()
        }
    }

    /// A frame with no context at all, used to evaluate constant
    /// expressions.
    pub fn empty() -> Environment<'static> {
        Environment::default()
    }

    /// A fresh frame chained over `self`.
    pub fn child(&self) -> Environment<'_> {
        Environment {
            outer: Some(self),
            ..Environment::default()
        }
    }

    pub fn with_doc(mut self, doc: &'a dyn Document) -> Environment<'a> {
        self.doc = Some(doc);
        self
    }

    pub fn with_key(mut self, key: &'a [u8]) -> Environment<'a> {
        self.key = Some(key);
        self
    }

    pub fn with_group(mut self, group: &'a Value) -> Environment<'a> {
        self.group = Some(group);
        self
    }

    pub fn document(&self) -> Option<&'a dyn Document> {
        self.doc.or_else(|| self.outer.and_then(|o| o.document()))
    }

    /// Storage key of the current document, set by scans and consumed by
    /// the replace/delete sinks.
    pub fn key(&self) -> Option<&'a [u8]> {
        self.key.or_else(|| self.outer.and_then(|o| o.key()))
    }

    pub fn group(&self) -> Option<&'a Value> {
        self.group.or_else(|| self.outer.and_then(|o| o.group()))
    }

    pub fn tx(&self) -> Option<&'a Transaction<'a>> {
        self.tx.or_else(|| self.outer.and_then(|o| o.tx()))
    }

    fn params(&self) -> Option<&'a [Param]> {
        self.params.or_else(|| self.outer.and_then(|o| o.params()))
    }

    /// 1-based positional parameter lookup.
    pub fn positional_param(&self, n: usize) -> Option<&'a Value> {
        self.params()
            .and_then(|ps| ps.get(n.checked_sub(1)?))
            .map(|p| &p.value)
    }

    pub fn named_param(&self, name: &str) -> Option<&'a Value> {
        self.params()?
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| &p.value)
    }
}
