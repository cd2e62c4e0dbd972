//! # Document Codec
//!
//! Serializes documents into the self-describing payloads written to table
//! stores. The bundled [`BinaryCodec`] uses a tag + length format in which
//! every variable-sized value carries its byte length up front, so
//! [`EncodedDocument::get_by_field`] skips over unrelated fields without
//! decoding them.
//!
//! ## Layout
//!
//! ```text
//! document := field*
//! field    := varint(name_len) name_bytes value
//! value    := tag payload
//!
//! tag 0 NULL      (no payload)
//! tag 1 FALSE     (no payload)
//! tag 2 TRUE      (no payload)
//! tag 3 INTEGER   zigzag varint
//! tag 4 DOUBLE    8 bytes little-endian IEEE 754
//! tag 5 TEXT      varint(len) bytes
//! tag 6 BLOB      varint(len) bytes
//! tag 7 ARRAY     varint(byte_len) value*
//! tag 8 DOCUMENT  varint(byte_len) field*
//! ```

use super::{Document, FieldBuffer, Value, ValueBuffer};
use crate::encoding::varint::{decode_varint, encode_varint};
use crate::errors::Error;
use eyre::{bail, ensure, Result};

const T_NULL: u8 = 0;
const T_FALSE: u8 = 1;
const T_TRUE: u8 = 2;
const T_INTEGER: u8 = 3;
const T_DOUBLE: u8 = 4;
const T_TEXT: u8 = 5;
const T_BLOB: u8 = 6;
const T_ARRAY: u8 = 7;
const T_DOCUMENT: u8 = 8;

/// Abstract document serialization used by tables. Implementations must be
/// self-describing for every value type.
pub trait Codec: Send + Sync {
    /// Appends the encoded form of `d` to `buf`.
    fn encode_document(&self, d: &dyn Document, buf: &mut Vec<u8>) -> Result<()>;

    /// Wraps encoded bytes in a lazily-decoded document.
    fn document<'a>(&self, bytes: &'a [u8]) -> Box<dyn Document + 'a>;
}

/// The bundled codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encode_document(&self, d: &dyn Document, buf: &mut Vec<u8>) -> Result<()> {
        d.iterate(&mut |name, value| {
            encode_varint(name.len() as u64, buf);
            buf.extend_from_slice(name.as_bytes());
            encode_value(value, buf);
            Ok(())
        })
    }

    fn document<'a>(&self, bytes: &'a [u8]) -> Box<dyn Document + 'a> {
        Box::new(EncodedDocument::new(bytes))
    }
}

fn encode_value(v: &Value, buf: &mut Vec<u8>) {
    match v {
        Value::Null => buf.push(T_NULL),
        Value::Bool(false) => buf.push(T_FALSE),
        Value::Bool(true) => buf.push(T_TRUE),
        Value::Integer(i) => {
            buf.push(T_INTEGER);
            encode_varint(zigzag(*i), buf);
        }
        Value::Double(d) => {
            buf.push(T_DOUBLE);
            buf.extend_from_slice(&d.to_le_bytes());
        }
        Value::Text(s) => {
            buf.push(T_TEXT);
            encode_varint(s.len() as u64, buf);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            buf.push(T_BLOB);
            encode_varint(b.len() as u64, buf);
            buf.extend_from_slice(b);
        }
        Value::Array(a) => {
            buf.push(T_ARRAY);
            let mut inner = Vec::new();
            for v in a.iter() {
                encode_value(v, &mut inner);
            }
            encode_varint(inner.len() as u64, buf);
            buf.extend_from_slice(&inner);
        }
        Value::Document(d) => {
            buf.push(T_DOCUMENT);
            let mut inner = Vec::new();
            for (name, value) in d.fields() {
                encode_varint(name.len() as u64, &mut inner);
                inner.extend_from_slice(name.as_bytes());
                encode_value(value, &mut inner);
            }
            encode_varint(inner.len() as u64, buf);
            buf.extend_from_slice(&inner);
        }
    }
}

fn zigzag(i: i64) -> u64 {
    ((i << 1) ^ (i >> 63)) as u64
}

fn unzigzag(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// A document backed by encoded bytes. Field reads scan the buffer and
/// decode only the requested value; documents handed out by table
/// iteration are of this type and live as long as the iterator's current
/// item.
#[derive(Debug, Clone, Copy)]
pub struct EncodedDocument<'a> {
    bytes: &'a [u8],
}

impl<'a> EncodedDocument<'a> {
    pub fn new(bytes: &'a [u8]) -> EncodedDocument<'a> {
        EncodedDocument { bytes }
    }

    /// Fully decodes into an owned buffer.
    pub fn to_field_buffer(&self) -> Result<FieldBuffer> {
        decode_fields(self.bytes)
    }
}

impl Document for EncodedDocument<'_> {
    fn get_by_field(&self, field: &str) -> Result<Value> {
        let mut pos = 0;
        while pos < self.bytes.len() {
            let (name_len, read) = decode_varint(&self.bytes[pos..])?;
            pos += read;
            let name_end = pos + name_len as usize;
            let name = self
                .bytes
                .get(pos..name_end)
                .ok_or_else(|| eyre::eyre!("truncated field name"))?;
            pos = name_end;
            if name == field.as_bytes() {
                let (v, _) = decode_value(self.bytes, pos)?;
                return Ok(v);
            }
            pos += skip_value(self.bytes, pos)?;
        }
        Err(Error::FieldNotFound.into())
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, &Value) -> Result<()>) -> Result<()> {
        let mut pos = 0;
        while pos < self.bytes.len() {
            let (name_len, read) = decode_varint(&self.bytes[pos..])?;
            pos += read;
            let name_end = pos + name_len as usize;
            let name = self
                .bytes
                .get(pos..name_end)
                .ok_or_else(|| eyre::eyre!("truncated field name"))?;
            let name = std::str::from_utf8(name)
                .map_err(|_| eyre::eyre!("field name is not utf-8"))?;
            pos = name_end;
            let (v, read) = decode_value(self.bytes, pos)?;
            pos += read;
            f(name, &v)?;
        }
        Ok(())
    }
}

fn decode_fields(bytes: &[u8]) -> Result<FieldBuffer> {
    let mut fb = FieldBuffer::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let (name_len, read) = decode_varint(&bytes[pos..])?;
        pos += read;
        let name_end = pos + name_len as usize;
        let name = bytes
            .get(pos..name_end)
            .ok_or_else(|| eyre::eyre!("truncated field name"))?;
        let name =
            String::from_utf8(name.to_vec()).map_err(|_| eyre::eyre!("field name is not utf-8"))?;
        pos = name_end;
        let (v, read) = decode_value(bytes, pos)?;
        pos += read;
        fb.push(name, v);
    }
    Ok(fb)
}

fn decode_value(bytes: &[u8], pos: usize) -> Result<(Value, usize)> {
    let t = *bytes
        .get(pos)
        .ok_or_else(|| eyre::eyre!("truncated value tag"))?;
    let body = pos + 1;

    match t {
        T_NULL => Ok((Value::Null, 1)),
        T_FALSE => Ok((Value::Bool(false), 1)),
        T_TRUE => Ok((Value::Bool(true), 1)),
        T_INTEGER => {
            let (u, read) = decode_varint(&bytes[body..])?;
            Ok((Value::Integer(unzigzag(u)), 1 + read))
        }
        T_DOUBLE => {
            let raw = bytes
                .get(body..body + 8)
                .ok_or_else(|| eyre::eyre!("truncated double"))?;
            let mut le = [0u8; 8];
            le.copy_from_slice(raw);
            Ok((Value::Double(f64::from_le_bytes(le)), 9))
        }
        T_TEXT => {
            let (len, read) = decode_varint(&bytes[body..])?;
            let start = body + read;
            let end = start + len as usize;
            let raw = bytes
                .get(start..end)
                .ok_or_else(|| eyre::eyre!("truncated text"))?;
            let s = String::from_utf8(raw.to_vec())
                .map_err(|_| eyre::eyre!("text value is not utf-8"))?;
            Ok((Value::Text(s), end - pos))
        }
        T_BLOB => {
            let (len, read) = decode_varint(&bytes[body..])?;
            let start = body + read;
            let end = start + len as usize;
            let raw = bytes
                .get(start..end)
                .ok_or_else(|| eyre::eyre!("truncated blob"))?;
            Ok((Value::Blob(raw.to_vec()), end - pos))
        }
        T_ARRAY => {
            let (len, read) = decode_varint(&bytes[body..])?;
            let start = body + read;
            let end = start + len as usize;
            ensure!(end <= bytes.len(), "truncated array");
            let mut vb = ValueBuffer::new();
            let mut p = start;
            while p < end {
                let (v, read) = decode_value(bytes, p)?;
                vb.append(v);
                p += read;
            }
            Ok((Value::Array(vb), end - pos))
        }
        T_DOCUMENT => {
            let (len, read) = decode_varint(&bytes[body..])?;
            let start = body + read;
            let end = start + len as usize;
            ensure!(end <= bytes.len(), "truncated nested document");
            let fb = decode_fields(&bytes[start..end])?;
            Ok((Value::Document(fb), end - pos))
        }
        other => bail!("unknown codec tag {}", other),
    }
}

/// Returns the total byte length of the value at `pos` without decoding it.
fn skip_value(bytes: &[u8], pos: usize) -> Result<usize> {
    let t = *bytes
        .get(pos)
        .ok_or_else(|| eyre::eyre!("truncated value tag"))?;
    let body = pos + 1;

    match t {
        T_NULL | T_FALSE | T_TRUE => Ok(1),
        T_INTEGER => {
            let (_, read) = decode_varint(&bytes[body..])?;
            Ok(1 + read)
        }
        T_DOUBLE => Ok(9),
        T_TEXT | T_BLOB | T_ARRAY | T_DOCUMENT => {
            let (len, read) = decode_varint(&bytes[body..])?;
            Ok(1 + read + len as usize)
        }
        other => bail!("unknown codec tag {}", other),
    }
}
