//! # JSON Round-Tripping
//!
//! Single-pass JSON parsing and printing for documents. The tokenizer is
//! hand-rolled and yields tokens on demand; all errors carry the byte
//! position of the offending input.
//!
//! Mapping rules:
//!
//! | JSON | Value | notes |
//! |------|-------|-------|
//! | null / true / false | Null / Bool | |
//! | number | Integer when exact i64, else Double | |
//! | string | Text | |
//! | array | Array | |
//! | object | Document | field order preserved |
//!
//! Blob has no JSON form: it prints as a base64 string and therefore does
//! not survive a round-trip (it comes back as Text).

use super::{Document, FieldBuffer, Value, ValueBuffer};
use eyre::{bail, Result};

/// Serializes any document to its JSON form.
pub fn encode(d: &dyn Document) -> Result<String> {
    let mut out = String::new();
    out.push('{');
    let mut first = true;
    d.iterate(&mut |name, value| {
        if !first {
            out.push_str(", ");
        }
        first = false;
        encode_string(name, &mut out);
        out.push_str(": ");
        encode_value_into(value, &mut out);
        Ok(())
    })?;
    out.push('}');
    Ok(out)
}

/// Serializes a single value to its JSON form.
pub fn encode_value(v: &Value) -> String {
    let mut out = String::new();
    encode_value_into(v, &mut out);
    out
}

fn encode_value_into(v: &Value, out: &mut String) {
    match v {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::Double(d) => {
            if d.is_finite() {
                let s = d.to_string();
                out.push_str(&s);
                // keep doubles distinguishable from integers
                if !s.contains('.') && !s.contains('e') && !s.contains('E') {
                    out.push_str(".0");
                }
            } else {
                out.push_str("null");
            }
        }
        Value::Text(s) => encode_string(s, out),
        Value::Blob(b) => encode_string(&base64(b), out),
        Value::Array(a) => {
            out.push('[');
            for (i, v) in a.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                encode_value_into(v, out);
            }
            out.push(']');
        }
        Value::Document(d) => {
            out.push('{');
            for (i, (name, value)) in d.fields().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                encode_string(name, out);
                out.push_str(": ");
                encode_value_into(value, out);
            }
            out.push('}');
        }
    }
}

fn encode_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn base64(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let n = (b0 << 16) | (b1 << 8) | b2;
        out.push(ALPHABET[(n >> 18) as usize & 63] as char);
        out.push(ALPHABET[(n >> 12) as usize & 63] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(n >> 6) as usize & 63] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[n as usize & 63] as char
        } else {
            '='
        });
    }
    out
}

/// Parses a JSON object into a document.
pub fn decode(input: &str) -> Result<FieldBuffer> {
    let mut t = Tokenizer::new(input);
    let v = parse_value(&mut t)?;
    t.expect_end()?;
    match v {
        Value::Document(fb) => Ok(fb),
        other => bail!("expected a JSON object, got {}", other.type_of()),
    }
}

/// Parses any JSON value.
pub fn decode_value(input: &str) -> Result<Value> {
    let mut t = Tokenizer::new(input);
    let v = parse_value(&mut t)?;
    t.expect_end()?;
    Ok(v)
}

struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.input.get(self.pos) {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.bump() {
            Some(b) if b == expected => Ok(()),
            Some(b) => bail!(
                "position {}: expected {:?}, got {:?}",
                self.pos - 1,
                expected as char,
                b as char
            ),
            None => bail!("position {}: expected {:?}, got end of input", self.pos, expected as char),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        if let Some(b) = self.peek() {
            bail!("position {}: trailing input starting at {:?}", self.pos, b as char);
        }
        Ok(())
    }

    fn parse_string(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            let b = match self.input.get(self.pos) {
                Some(b) => *b,
                None => bail!("position {}: unterminated string", self.pos),
            };
            self.pos += 1;
            match b {
                b'"' => return Ok(out),
                b'\\' => {
                    let esc = self
                        .input
                        .get(self.pos)
                        .copied()
                        .ok_or_else(|| eyre::eyre!("position {}: unterminated escape", self.pos))?;
                    self.pos += 1;
                    match esc {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => {
                            let first = self.parse_hex4()?;
                            let code = if (0xd800..0xdc00).contains(&first) {
                                // surrogate pair
                                if self.input.get(self.pos) == Some(&b'\\')
                                    && self.input.get(self.pos + 1) == Some(&b'u')
                                {
                                    self.pos += 2;
                                    let second = self.parse_hex4()?;
                                    0x10000 + ((first - 0xd800) << 10) + (second - 0xdc00)
                                } else {
                                    bail!("position {}: lone surrogate", self.pos);
                                }
                            } else {
                                first
                            };
                            match char::from_u32(code) {
                                Some(c) => out.push(c),
                                None => bail!("position {}: invalid code point", self.pos),
                            }
                        }
                        other => bail!("position {}: invalid escape {:?}", self.pos, other as char),
                    }
                }
                _ => {
                    // re-decode the utf-8 sequence starting here
                    let start = self.pos - 1;
                    let len = utf8_len(b);
                    let end = start + len;
                    let slice = self
                        .input
                        .get(start..end)
                        .ok_or_else(|| eyre::eyre!("position {}: truncated utf-8", start))?;
                    let s = std::str::from_utf8(slice)
                        .map_err(|_| eyre::eyre!("position {}: invalid utf-8", start))?;
                    out.push_str(s);
                    self.pos = end;
                }
            }
        }
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        let slice = self
            .input
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| eyre::eyre!("position {}: truncated \\u escape", self.pos))?;
        let s = std::str::from_utf8(slice)
            .map_err(|_| eyre::eyre!("position {}: invalid \\u escape", self.pos))?;
        let n = u32::from_str_radix(s, 16)
            .map_err(|_| eyre::eyre!("position {}: invalid \\u escape {:?}", self.pos, s))?;
        self.pos += 4;
        Ok(n)
    }

    fn parse_number(&mut self) -> Result<Value> {
        self.skip_whitespace();
        let start = self.pos;
        let mut integral = true;
        while let Some(b) = self.input.get(self.pos) {
            match b {
                b'0'..=b'9' | b'-' | b'+' => self.pos += 1,
                b'.' | b'e' | b'E' => {
                    integral = false;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let s = std::str::from_utf8(&self.input[start..self.pos]).expect("ascii number");
        if integral {
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::Integer(i));
            }
        }
        s.parse::<f64>()
            .map(Value::Double)
            .map_err(|_| eyre::eyre!("position {}: invalid number {:?}", start, s))
    }

    fn parse_keyword(&mut self, word: &str, value: Value) -> Result<Value> {
        self.skip_whitespace();
        let end = self.pos + word.len();
        if self.input.get(self.pos..end) == Some(word.as_bytes()) {
            self.pos = end;
            Ok(value)
        } else {
            bail!("position {}: expected {:?}", self.pos, word)
        }
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

fn parse_value(t: &mut Tokenizer<'_>) -> Result<Value> {
    match t.peek() {
        Some(b'{') => {
            t.bump();
            let mut fb = FieldBuffer::new();
            if t.peek() == Some(b'}') {
                t.bump();
                return Ok(Value::Document(fb));
            }
            loop {
                let name = t.parse_string()?;
                t.expect(b':')?;
                let value = parse_value(t)?;
                fb.push(name, value);
                match t.bump() {
                    Some(b',') => continue,
                    Some(b'}') => return Ok(Value::Document(fb)),
                    _ => bail!("position {}: expected ',' or '}}'", t.pos),
                }
            }
        }
        Some(b'[') => {
            t.bump();
            let mut vb = ValueBuffer::new();
            if t.peek() == Some(b']') {
                t.bump();
                return Ok(Value::Array(vb));
            }
            loop {
                vb.append(parse_value(t)?);
                match t.bump() {
                    Some(b',') => continue,
                    Some(b']') => return Ok(Value::Array(vb)),
                    _ => bail!("position {}: expected ',' or ']'", t.pos),
                }
            }
        }
        Some(b'"') => Ok(Value::Text(t.parse_string()?)),
        Some(b't') => t.parse_keyword("true", Value::Bool(true)),
        Some(b'f') => t.parse_keyword("false", Value::Bool(false)),
        Some(b'n') => t.parse_keyword("null", Value::Null),
        Some(b) if b == b'-' || b.is_ascii_digit() => t.parse_number(),
        Some(b) => bail!("position {}: unexpected {:?}", t.pos, b as char),
        None => bail!("position {}: unexpected end of input", t.pos),
    }
}
