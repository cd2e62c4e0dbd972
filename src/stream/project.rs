//! # Projection
//!
//! Project replaces the current document with a [`MaskDocument`]: a
//! virtual document that exposes exactly the projected expressions,
//! evaluating them on access and expanding the wildcard over the source
//! document, all without copying a field.

use crate::document::{Document, Value};
use crate::errors::Error;
use crate::expr::{Environment, Expr};
use eyre::Result;

/// Emits one projected row over `env`.
pub(crate) fn project_one(
    exprs: &[Expr],
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let mask = MaskDocument { env, exprs };
    let child = env.child().with_doc(&mask);
    f(&child)
}

/// A document whose fields are the projected expressions of the
/// environment below it. Wildcards pass the source fields through without
/// materializing them.
pub struct MaskDocument<'a> {
    pub(crate) env: &'a Environment<'a>,
    pub(crate) exprs: &'a [Expr],
}

impl Document for MaskDocument<'_> {
    fn get_by_field(&self, field: &str) -> Result<Value> {
        for e in self.exprs {
            if let Expr::Wildcard = e {
                if let Some(src) = self.env.document() {
                    match src.get_by_field(field) {
                        Ok(v) => return Ok(v),
                        Err(err) if Error::FieldNotFound.is(&err) => {}
                        Err(err) => return Err(err),
                    }
                }
                continue;
            }
            if e.result_field() == field {
                return e.eval(self.env);
            }
        }
        Err(Error::FieldNotFound.into())
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, &Value) -> Result<()>) -> Result<()> {
        let mut seen: Vec<String> = Vec::new();

        for e in self.exprs {
            if let Expr::Wildcard = e {
                if let Some(src) = self.env.document() {
                    src.iterate(&mut |name, value| {
                        if seen.iter().any(|s| s == name) {
                            return Ok(());
                        }
                        seen.push(name.to_string());
                        f(name, value)
                    })?;
                }
                continue;
            }

            let name = e.result_field();
            if seen.iter().any(|s| s == &name) {
                continue;
            }
            let v = e.eval(self.env)?;
            f(&name, &v)?;
            seen.push(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldBuffer;
    use crate::expr::ArithOp;

    fn source() -> FieldBuffer {
        FieldBuffer::new()
            .add("a", Value::Integer(1))
            .add("b", Value::Integer(2))
    }

    fn masked(exprs: &[Expr], doc: &FieldBuffer) -> FieldBuffer {
        let root = Environment::empty();
        let env = root.child().with_doc(doc);
        let mask = MaskDocument { env: &env, exprs };
        FieldBuffer::copy_from(&mask).unwrap()
    }

    #[test]
    fn wildcard_re_emits_all_source_fields_in_order() {
        let doc = source();
        let out = masked(&[Expr::Wildcard], &doc);
        assert_eq!(out, doc);
    }

    #[test]
    fn named_expressions_project_under_their_alias() {
        let doc = source();
        let exprs = vec![Expr::named(
            Expr::Arith(
                ArithOp::Add,
                Box::new(Expr::path("a")),
                Box::new(Expr::path("b")),
            ),
            "total",
        )];
        let out = masked(&exprs, &doc);
        assert_eq!(out.get("total"), Some(&Value::Integer(3)));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn explicit_fields_hide_everything_else() {
        let doc = source();
        let out = masked(&[Expr::path("b")], &doc);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("b"), Some(&Value::Integer(2)));
        assert!(out.get("a").is_none());
    }

    #[test]
    fn lookup_by_expression_rendering_works() {
        let doc = source();
        let root = Environment::empty();
        let env = root.child().with_doc(&doc);
        let exprs = [Expr::path("a")];
        let mask = MaskDocument { env: &env, exprs: &exprs };
        assert_eq!(mask.get_by_field("a").unwrap(), Value::Integer(1));
        let err = mask.get_by_field("b").unwrap_err();
        assert!(Error::FieldNotFound.is(&err));
    }
}
