//! Restricted Marshal reader/writer.
//!
//! Supports exactly the graph shapes the engine's script store uses: arrays,
//! Fixnums, raw binary strings, ivar-tagged UTF-8 strings (the `:E => true`
//! encoding marker, with symbol-link reuse), booleans and nil. Object links,
//! bignums, hashes and user classes are out of scope and rejected.

use crate::error::{BundleError, Result};

/// Marshal wire version written by the target engine.
pub const MARSHAL_MAJOR: u8 = 4;
pub const MARSHAL_MINOR: u8 = 8;

/// A decoded Marshal value from the restricted subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    /// Raw string payload. Encoding ivars are consumed and discarded; callers
    /// decide how to interpret the bytes.
    Bytes(Vec<u8>),
    Symbol(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Streaming reader over a Marshal byte buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    symbols: Vec<Vec<u8>>,
}

impl<'a> Reader<'a> {
    /// Wrap a buffer, validating the version header.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(BundleError::corrupt("truncated header"));
        }
        if buf[0] != MARSHAL_MAJOR || buf[1] != MARSHAL_MINOR {
            return Err(BundleError::UnsupportedVersion {
                major: buf[0],
                minor: buf[1],
            });
        }
        Ok(Self {
            buf,
            pos: 2,
            symbols: Vec::new(),
        })
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| BundleError::corrupt("unexpected end of stream"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| BundleError::corrupt("unexpected end of stream"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Decode a Marshal packed integer.
    pub fn read_long(&mut self) -> Result<i64> {
        let c = self.read_byte()? as i8;
        match c {
            0 => Ok(0),
            1..=4 => {
                let n = c as usize;
                let mut x: i64 = 0;
                for i in 0..n {
                    x |= i64::from(self.read_byte()?) << (8 * i);
                }
                Ok(x)
            }
            -4..=-1 => {
                let n = (-c) as usize;
                let mut x: i64 = -1;
                for i in 0..n {
                    x &= !(0xFF_i64 << (8 * i));
                    x |= i64::from(self.read_byte()?) << (8 * i);
                }
                Ok(x)
            }
            5..=127 => Ok(i64::from(c) - 5),
            _ => Ok(i64::from(c) + 5),
        }
    }

    fn read_length(&mut self) -> Result<usize> {
        let len = self.read_long()?;
        usize::try_from(len).map_err(|_| BundleError::corrupt("negative length"))
    }

    /// Decode the next value in the stream.
    pub fn read_value(&mut self) -> Result<Value> {
        let tag = self.read_byte()?;
        match tag {
            b'0' => Ok(Value::Nil),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'i' => Ok(Value::Int(self.read_long()?)),
            b'"' => {
                let len = self.read_length()?;
                Ok(Value::Bytes(self.read_bytes(len)?.to_vec()))
            }
            b'I' => {
                let inner = self.read_value()?;
                let ivars = self.read_length()?;
                for _ in 0..ivars {
                    // Symbol key then value; only encoding markers occur here.
                    self.read_value()?;
                    self.read_value()?;
                }
                Ok(inner)
            }
            b':' => {
                let len = self.read_length()?;
                let sym = self.read_bytes(len)?.to_vec();
                self.symbols.push(sym.clone());
                Ok(Value::Symbol(sym))
            }
            b';' => {
                let idx = self.read_length()?;
                let sym = self
                    .symbols
                    .get(idx)
                    .ok_or_else(|| BundleError::corrupt("dangling symbol link"))?;
                Ok(Value::Symbol(sym.clone()))
            }
            b'[' => {
                let len = self.read_length()?;
                let mut items = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                Ok(Value::Array(items))
            }
            other => Err(BundleError::corrupt(format!(
                "unsupported marshal tag 0x{other:02x}"
            ))),
        }
    }
}

/// Streaming writer producing a Marshal byte buffer.
pub struct Writer {
    out: Vec<u8>,
    symbols: Vec<Vec<u8>>,
}

impl Writer {
    pub fn new() -> Self {
        Self {
            out: vec![MARSHAL_MAJOR, MARSHAL_MINOR],
            symbols: Vec::new(),
        }
    }

    /// Encode a Marshal packed integer.
    ///
    /// The packed form carries at most four payload bytes, so only the i32
    /// range is representable; anything wider would silently garble the
    /// stream downstream of this byte.
    pub fn write_long(&mut self, v: i64) {
        debug_assert!(
            v >= i64::from(i32::MIN) && v <= i64::from(i32::MAX),
            "marshal long out of range: {v}"
        );
        if v == 0 {
            self.out.push(0);
        } else if v > 0 && v < 123 {
            self.out.push((v + 5) as u8);
        } else if v < 0 && v > -124 {
            self.out.push((v - 5) as i8 as u8);
        } else {
            let mut rest = v;
            let mut bytes = Vec::with_capacity(4);
            for i in 1..=4_i8 {
                bytes.push((rest & 0xFF) as u8);
                rest >>= 8;
                if rest == 0 {
                    self.out.push(i as u8);
                    break;
                }
                if rest == -1 {
                    self.out.push((-i) as u8);
                    break;
                }
            }
            self.out.extend_from_slice(&bytes);
        }
    }

    pub fn write_array_header(&mut self, len: usize) {
        self.out.push(b'[');
        self.write_long(len as i64);
    }

    pub fn write_int(&mut self, v: i64) {
        self.out.push(b'i');
        self.write_long(v);
    }

    /// Raw binary string, no encoding ivar (zlib payloads).
    pub fn write_binary_string(&mut self, data: &[u8]) {
        self.out.push(b'"');
        self.write_long(data.len() as i64);
        self.out.extend_from_slice(data);
    }

    /// UTF-8 string tagged with the engine's `:E => true` encoding ivar.
    pub fn write_utf8_string(&mut self, s: &str) {
        self.out.push(b'I');
        self.write_binary_string(s.as_bytes());
        self.write_long(1);
        self.write_symbol(b"E");
        self.out.push(b'T');
    }

    fn write_symbol(&mut self, sym: &[u8]) {
        if let Some(idx) = self.symbols.iter().position(|s| s == sym) {
            self.out.push(b';');
            self.write_long(idx as i64);
        } else {
            self.out.push(b':');
            self.write_long(sym.len() as i64);
            self.out.extend_from_slice(sym);
            self.symbols.push(sym.to_vec());
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
