//! # Scalar Functions
//!
//! Fixed-arity scalar functions callable from any expression. Each
//! variant carries its arguments, so arity is enforced by construction.

use super::{Environment, Expr};
use crate::document::Value;
use eyre::Result;
use std::fmt;

/// A scalar function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// Storage key of the current document, as a blob.
    Pk,
    /// Name of the value's type, as text.
    TypeOf(Box<Expr>),
    /// Character count of text, element count of arrays and documents,
    /// byte count of blobs.
    Len(Box<Expr>),
    Lower(Box<Expr>),
    Upper(Box<Expr>),
    Abs(Box<Expr>),
}

impl Function {
    pub(crate) fn eval(&self, env: &Environment<'_>) -> Result<Value> {
        match self {
            Function::Pk => Ok(match env.key() {
                Some(key) => Value::Blob(key.to_vec()),
                None => Value::Null,
            }),
            Function::TypeOf(e) => {
                let v = e.eval(env)?;
                Ok(Value::Text(v.type_of().name().to_string()))
            }
            Function::Len(e) => Ok(match e.eval(env)? {
                Value::Text(s) => Value::Integer(s.chars().count() as i64),
                Value::Blob(b) => Value::Integer(b.len() as i64),
                Value::Array(a) => Value::Integer(a.len() as i64),
                Value::Document(d) => Value::Integer(d.len() as i64),
                _ => Value::Null,
            }),
            Function::Lower(e) => Ok(match e.eval(env)? {
                Value::Text(s) => Value::Text(s.to_lowercase()),
                _ => Value::Null,
            }),
            Function::Upper(e) => Ok(match e.eval(env)? {
                Value::Text(s) => Value::Text(s.to_uppercase()),
                _ => Value::Null,
            }),
            Function::Abs(e) => Ok(match e.eval(env)? {
                Value::Integer(i) => match i.checked_abs() {
                    Some(a) => Value::Integer(a),
                    None => Value::Double((i as f64).abs()),
                },
                Value::Double(d) => Value::Double(d.abs()),
                _ => Value::Null,
            }),
        }
    }

    pub(crate) fn args(&self) -> Option<&Expr> {
        match self {
            Function::Pk => None,
            Function::TypeOf(e)
            | Function::Len(e)
            | Function::Lower(e)
            | Function::Upper(e)
            | Function::Abs(e) => Some(e),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Pk => write!(f, "PK()"),
            Function::TypeOf(e) => write!(f, "TYPEOF({})", e),
            Function::Len(e) => write!(f, "LEN({})", e),
            Function::Lower(e) => write!(f, "LOWER({})", e),
            Function::Upper(e) => write!(f, "UPPER({})", e),
            Function::Abs(e) => write!(f, "ABS({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldBuffer;

    fn eval(f: Function) -> Value {
        f.eval(&Environment::empty()).unwrap()
    }

    #[test]
    fn typeof_names_the_value_type() {
        let f = Function::TypeOf(Box::new(Expr::Literal(Value::Integer(1))));
        assert_eq!(eval(f), Value::Text("integer".into()));
    }

    #[test]
    fn len_counts_characters_elements_and_bytes() {
        assert_eq!(
            eval(Function::Len(Box::new(Expr::Literal(Value::Text("héllo".into()))))),
            Value::Integer(5)
        );
        assert_eq!(
            eval(Function::Len(Box::new(Expr::Literal(Value::Blob(vec![1, 2]))))),
            Value::Integer(2)
        );
        assert_eq!(
            eval(Function::Len(Box::new(Expr::Literal(Value::Integer(5))))),
            Value::Null
        );
    }

    #[test]
    fn pk_without_a_scanned_document_is_null() {
        assert_eq!(eval(Function::Pk), Value::Null);
    }

    #[test]
    fn pk_returns_the_storage_key() {
        let doc = FieldBuffer::new();
        let key = [1u8, 2, 3];
        let root = Environment::empty();
        let env = root.child().with_doc(&doc).with_key(&key);
        assert_eq!(
            Function::Pk.eval(&env).unwrap(),
            Value::Blob(vec![1, 2, 3])
        );
    }

    #[test]
    fn abs_handles_the_minimum_integer() {
        let f = Function::Abs(Box::new(Expr::Literal(Value::Integer(i64::MIN))));
        assert_eq!(eval(f), Value::Double((i64::MIN as f64).abs()));
    }
}
