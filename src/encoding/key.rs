//! # Order-Preserving Key Encoding
//!
//! Encodes typed values into bytes whose lexicographic order matches the
//! value order, so storage keys and index entries can be compared with a
//! single `memcmp`.
//!
//! Two modes:
//!
//! - **Typed** (`encode_typed`): no tag byte; used for primary keys whose
//!   type is declared. Both sides of a comparison are known to be of the
//!   same type.
//! - **Untyped** (`encode_value`): a type tag byte first, so decoders can
//!   round-trip without context. Values order within their type and group
//!   by tag across types: Null < Bool < Integer < Double < Text < Blob <
//!   Array < Document.
//!
//! ## Scalar strategies
//!
//! - Integers: sign bit flipped, big-endian. `-1 < 0 < 1` holds bytewise.
//! - Doubles: IEEE 754 bit trick — negatives invert all bits, positives
//!   flip the sign bit. Negative zero normalizes to zero before encoding.
//! - Text/Blob: escape encoding with terminator so that a shorter prefix
//!   sorts before any longer key sharing it:
//!
//! ```text
//! 0x00 -> 0x00 0xFF
//! 0xFF -> 0xFF 0x00
//! terminator: 0x00 0x00
//! ```
//!
//! ## Composite strategies
//!
//! Arrays encode their elements in untyped mode, each followed by a 0x01
//! separator, closed by 0x00. Documents encode (escaped name, untyped
//! value) pairs the same way. Scalar encodings are prefix-free, so
//! element-wise order carries over to byte order and shorter sequences
//! sort first.

use crate::document::{FieldBuffer, Value, ValueBuffer, ValueType};
use eyre::{bail, ensure, Result};

/// Type tag bytes for untyped mode.
pub mod tag {
    pub const NULL: u8 = 0x05;
    pub const FALSE: u8 = 0x10;
    pub const TRUE: u8 = 0x11;
    pub const INTEGER: u8 = 0x20;
    pub const DOUBLE: u8 = 0x25;
    pub const TEXT: u8 = 0x30;
    pub const BLOB: u8 = 0x35;
    pub const ARRAY: u8 = 0x40;
    pub const DOCUMENT: u8 = 0x45;
}

const SIGN_BIT: u64 = 1 << 63;
const SEPARATOR: u8 = 0x01;
const TERMINATOR: u8 = 0x00;

/// Encodes `v` without a type tag. `v` must already be of the declared
/// type `ty` (constraint validation casts beforehand); Null is rejected
/// because typed keys are only built for present values.
pub fn encode_typed(ty: ValueType, v: &Value, buf: &mut Vec<u8>) -> Result<()> {
    ensure!(
        v.type_of() == ty,
        "value of type {} cannot be encoded as {}",
        v.type_of(),
        ty
    );

    match v {
        Value::Null => bail!("null cannot be encoded as a typed key"),
        Value::Bool(b) => buf.push(u8::from(*b)),
        Value::Integer(i) => encode_int(*i, buf),
        Value::Double(d) => encode_double(*d, buf),
        Value::Text(s) => encode_escaped(s.as_bytes(), buf),
        Value::Blob(b) => encode_escaped(b, buf),
        Value::Array(a) => encode_array(a, buf),
        Value::Document(d) => encode_document(d, buf),
    }
    Ok(())
}

/// Decodes a typed key back into a value, consuming the whole buffer.
pub fn decode_typed(ty: ValueType, bytes: &[u8]) -> Result<Value> {
    let (v, read) = decode_typed_at(ty, bytes, 0)?;
    ensure!(read == bytes.len(), "trailing bytes after typed key");
    Ok(v)
}

/// Encodes `v` in untyped mode: tag byte plus typed payload.
pub fn encode_value(v: &Value, buf: &mut Vec<u8>) {
    match v {
        Value::Null => buf.push(tag::NULL),
        Value::Bool(false) => buf.push(tag::FALSE),
        Value::Bool(true) => buf.push(tag::TRUE),
        Value::Integer(i) => {
            buf.push(tag::INTEGER);
            encode_int(*i, buf);
        }
        Value::Double(d) => {
            buf.push(tag::DOUBLE);
            encode_double(*d, buf);
        }
        Value::Text(s) => {
            buf.push(tag::TEXT);
            encode_escaped(s.as_bytes(), buf);
        }
        Value::Blob(b) => {
            buf.push(tag::BLOB);
            encode_escaped(b, buf);
        }
        Value::Array(a) => {
            buf.push(tag::ARRAY);
            encode_array(a, buf);
        }
        Value::Document(d) => {
            buf.push(tag::DOCUMENT);
            encode_document(d, buf);
        }
    }
}

/// Decodes an untyped key, consuming the whole buffer.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    let (v, read) = decode_value_at(bytes, 0)?;
    ensure!(read == bytes.len(), "trailing bytes after encoded value");
    Ok(v)
}

/// Length in bytes of the untyped encoding at the front of `bytes`. Index
/// entries append the document key after the encoded value; this finds the
/// boundary.
pub fn encoded_value_len(bytes: &[u8]) -> Result<usize> {
    let (_, read) = decode_value_at(bytes, 0)?;
    Ok(read)
}

fn encode_int(i: i64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&((i as u64) ^ SIGN_BIT).to_be_bytes());
}

fn encode_double(d: f64, buf: &mut Vec<u8>) {
    let d = if d == 0.0 { 0.0 } else { d };
    let bits = d.to_bits();
    let enc = if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT
    };
    buf.extend_from_slice(&enc.to_be_bytes());
}

fn encode_escaped(bytes: &[u8], buf: &mut Vec<u8>) {
    for b in bytes {
        match b {
            0x00 => buf.extend_from_slice(&[0x00, 0xFF]),
            0xFF => buf.extend_from_slice(&[0xFF, 0x00]),
            b => buf.push(*b),
        }
    }
    buf.extend_from_slice(&[TERMINATOR, TERMINATOR]);
}

fn encode_array(a: &ValueBuffer, buf: &mut Vec<u8>) {
    for v in a.iter() {
        encode_value(v, buf);
        buf.push(SEPARATOR);
    }
    buf.push(TERMINATOR);
}

fn encode_document(d: &FieldBuffer, buf: &mut Vec<u8>) {
    for (name, value) in d.fields() {
        encode_escaped(name.as_bytes(), buf);
        encode_value(value, buf);
        buf.push(SEPARATOR);
    }
    buf.push(TERMINATOR);
}

fn decode_typed_at(ty: ValueType, bytes: &[u8], pos: usize) -> Result<(Value, usize)> {
    match ty {
        ValueType::Null => bail!("null cannot be decoded as a typed key"),
        ValueType::Bool => {
            let b = *bytes
                .get(pos)
                .ok_or_else(|| eyre::eyre!("truncated bool key"))?;
            Ok((Value::Bool(b != 0), 1))
        }
        ValueType::Integer => {
            let raw = fixed8(bytes, pos, "integer")?;
            Ok((Value::Integer((u64::from_be_bytes(raw) ^ SIGN_BIT) as i64), 8))
        }
        ValueType::Double => {
            let raw = fixed8(bytes, pos, "double")?;
            let enc = u64::from_be_bytes(raw);
            let bits = if enc & SIGN_BIT != 0 { enc ^ SIGN_BIT } else { !enc };
            Ok((Value::Double(f64::from_bits(bits)), 8))
        }
        ValueType::Text => {
            let (raw, read) = decode_escaped(bytes, pos)?;
            let s = String::from_utf8(raw).map_err(|_| eyre::eyre!("text key is not utf-8"))?;
            Ok((Value::Text(s), read))
        }
        ValueType::Blob => {
            let (raw, read) = decode_escaped(bytes, pos)?;
            Ok((Value::Blob(raw), read))
        }
        ValueType::Array => decode_array_at(bytes, pos),
        ValueType::Document => decode_document_at(bytes, pos),
    }
}

fn decode_value_at(bytes: &[u8], pos: usize) -> Result<(Value, usize)> {
    let t = *bytes
        .get(pos)
        .ok_or_else(|| eyre::eyre!("empty encoded value"))?;
    let pos = pos + 1;

    let (v, read) = match t {
        tag::NULL => (Value::Null, 0),
        tag::FALSE => (Value::Bool(false), 0),
        tag::TRUE => (Value::Bool(true), 0),
        tag::INTEGER => decode_typed_at(ValueType::Integer, bytes, pos)?,
        tag::DOUBLE => decode_typed_at(ValueType::Double, bytes, pos)?,
        tag::TEXT => decode_typed_at(ValueType::Text, bytes, pos)?,
        tag::BLOB => decode_typed_at(ValueType::Blob, bytes, pos)?,
        tag::ARRAY => decode_typed_at(ValueType::Array, bytes, pos)?,
        tag::DOCUMENT => decode_typed_at(ValueType::Document, bytes, pos)?,
        other => bail!("unknown key type tag 0x{:02x}", other),
    };
    Ok((v, read + 1))
}

fn decode_array_at(bytes: &[u8], start: usize) -> Result<(Value, usize)> {
    let mut pos = start;
    let mut vb = ValueBuffer::new();
    loop {
        match bytes.get(pos) {
            Some(&TERMINATOR) => return Ok((Value::Array(vb), pos + 1 - start)),
            Some(_) => {
                let (v, read) = decode_value_at(bytes, pos)?;
                vb.append(v);
                pos += read;
                ensure!(bytes.get(pos) == Some(&SEPARATOR), "malformed array key");
                pos += 1;
            }
            None => bail!("truncated array key"),
        }
    }
}

fn decode_document_at(bytes: &[u8], start: usize) -> Result<(Value, usize)> {
    let mut pos = start;
    let mut fb = FieldBuffer::new();
    loop {
        match bytes.get(pos) {
            // a terminator, unless it opens an escaped NUL in a field name
            Some(&TERMINATOR) if bytes.get(pos + 1) != Some(&0xFF) => {
                return Ok((Value::Document(fb), pos + 1 - start));
            }
            Some(_) => {
                let (raw, read) = decode_escaped(bytes, pos)?;
                let name =
                    String::from_utf8(raw).map_err(|_| eyre::eyre!("field name is not utf-8"))?;
                pos += read;
                let (v, read) = decode_value_at(bytes, pos)?;
                fb.push(name, v);
                pos += read;
                ensure!(bytes.get(pos) == Some(&SEPARATOR), "malformed document key");
                pos += 1;
            }
            None => bail!("truncated document key"),
        }
    }
}

fn decode_escaped(bytes: &[u8], start: usize) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut pos = start;
    loop {
        match (bytes.get(pos), bytes.get(pos + 1)) {
            (Some(&0x00), Some(&0x00)) => return Ok((out, pos + 2 - start)),
            (Some(&0x00), Some(&0xFF)) => {
                out.push(0x00);
                pos += 2;
            }
            (Some(&0xFF), Some(&0x00)) => {
                out.push(0xFF);
                pos += 2;
            }
            (Some(&b), _) if b != 0x00 && b != 0xFF => {
                out.push(b);
                pos += 1;
            }
            _ => bail!("malformed escape sequence in key"),
        }
    }
}

fn fixed8(bytes: &[u8], pos: usize, what: &str) -> Result<[u8; 8]> {
    let slice = bytes
        .get(pos..pos + 8)
        .ok_or_else(|| eyre::eyre!("truncated {} key", what))?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(slice);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn enc(v: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_value(v, &mut buf);
        buf
    }

    fn enc_typed(ty: ValueType, v: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_typed(ty, v, &mut buf).unwrap();
        buf
    }

    #[test]
    fn integers_order_across_sign() {
        let values = [i64::MIN, -100, -1, 0, 1, 100, i64::MAX];
        for pair in values.windows(2) {
            let a = enc_typed(ValueType::Integer, &Value::Integer(pair[0]));
            let b = enc_typed(ValueType::Integer, &Value::Integer(pair[1]));
            assert!(a < b, "{} should encode below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn doubles_order_across_sign_and_magnitude() {
        let values = [f64::NEG_INFINITY, -1e10, -1.5, -0.0, 0.0, 1.5, 1e10, f64::INFINITY];
        for pair in values.windows(2) {
            let a = enc_typed(ValueType::Double, &Value::Double(pair[0]));
            let b = enc_typed(ValueType::Double, &Value::Double(pair[1]));
            assert!(a <= b, "{} should not encode above {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn negative_zero_encodes_like_zero() {
        assert_eq!(
            enc_typed(ValueType::Double, &Value::Double(-0.0)),
            enc_typed(ValueType::Double, &Value::Double(0.0)),
        );
    }

    #[test]
    fn shorter_text_prefix_sorts_first() {
        let a = enc_typed(ValueType::Text, &Value::Text("ab".into()));
        let b = enc_typed(ValueType::Text, &Value::Text("ab0".into()));
        assert!(a < b);
    }

    #[test]
    fn embedded_nul_bytes_do_not_terminate_early() {
        let a = enc_typed(ValueType::Blob, &Value::Blob(vec![0x61, 0x00]));
        let b = enc_typed(ValueType::Blob, &Value::Blob(vec![0x61, 0x01]));
        assert!(a < b);
        assert_eq!(
            decode_typed(ValueType::Blob, &a).unwrap(),
            Value::Blob(vec![0x61, 0x00])
        );
    }

    #[test]
    fn untyped_values_group_by_type_tag() {
        let null = enc(&Value::Null);
        let boolean = enc(&Value::Bool(true));
        let int = enc(&Value::Integer(i64::MAX));
        let text = enc(&Value::Text("a".into()));
        assert!(null < boolean);
        assert!(boolean < int);
        assert!(int < text);
    }

    #[test]
    fn arrays_order_element_wise_and_by_length() {
        let a1: Value = Value::Array([Value::Integer(1)].into_iter().collect());
        let a12: Value = Value::Array([Value::Integer(1), Value::Integer(2)].into_iter().collect());
        let a2: Value = Value::Array([Value::Integer(2)].into_iter().collect());
        assert!(enc(&a1) < enc(&a12));
        assert!(enc(&a12) < enc(&a2));
    }

    #[test]
    fn nested_values_round_trip_untyped() {
        let doc = Value::Document(
            crate::document::FieldBuffer::new()
                .add("a", Value::Integer(-5))
                .add("b", Value::Array([Value::Text("x".into()), Value::Null].into_iter().collect())),
        );
        assert_eq!(decode_value(&enc(&doc)).unwrap(), doc);
    }

    #[test]
    fn typed_key_with_wrong_value_type_is_rejected() {
        let mut buf = Vec::new();
        assert!(encode_typed(ValueType::Integer, &Value::Text("x".into()), &mut buf).is_err());
    }

    proptest! {
        #[test]
        fn typed_integer_round_trips(i in any::<i64>()) {
            let bytes = enc_typed(ValueType::Integer, &Value::Integer(i));
            prop_assert_eq!(decode_typed(ValueType::Integer, &bytes).unwrap(), Value::Integer(i));
        }

        #[test]
        fn typed_integer_byte_order_matches_value_order(a in any::<i64>(), b in any::<i64>()) {
            let ea = enc_typed(ValueType::Integer, &Value::Integer(a));
            let eb = enc_typed(ValueType::Integer, &Value::Integer(b));
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }

        #[test]
        fn typed_double_byte_order_matches_value_order(
            a in any::<f64>().prop_filter("finite", |d| d.is_finite()),
            b in any::<f64>().prop_filter("finite", |d| d.is_finite()),
        ) {
            let ea = enc_typed(ValueType::Double, &Value::Double(a));
            let eb = enc_typed(ValueType::Double, &Value::Double(b));
            let expected = a.partial_cmp(&b).unwrap();
            // -0.0 and 0.0 encode identically
            if a == b {
                prop_assert_eq!(ea, eb);
            } else {
                prop_assert_eq!(ea.cmp(&eb), expected);
            }
        }

        #[test]
        fn typed_text_byte_order_matches_value_order(a in ".*", b in ".*") {
            let ea = enc_typed(ValueType::Text, &Value::Text(a.clone()));
            let eb = enc_typed(ValueType::Text, &Value::Text(b.clone()));
            prop_assert_eq!(ea.cmp(&eb), a.as_bytes().cmp(b.as_bytes()));
        }

        #[test]
        fn typed_blob_round_trips(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let bytes = enc_typed(ValueType::Blob, &Value::Blob(data.clone()));
            prop_assert_eq!(decode_typed(ValueType::Blob, &bytes).unwrap(), Value::Blob(data));
        }

        #[test]
        fn untyped_scalars_round_trip(i in any::<i64>(), s in ".*") {
            for v in [Value::Null, Value::Bool(true), Value::Integer(i), Value::Text(s.clone())] {
                let mut buf = Vec::new();
                encode_value(&v, &mut buf);
                prop_assert_eq!(decode_value(&buf).unwrap(), v);
            }
        }
    }
}
