//! Deterministic byte codec for persisted records.
//!
//! Every record format in the store is byte-exact: little-endian integers,
//! var-uints for counts, raw hash/address bytes. The codec is hand-rolled so
//! each layout is visible at the call site and never depends on derive-order
//! or framework versioning.
//!
//! Var-uints use the compact format: values below `0xFD` are a single byte;
//! `0xFD`, `0xFE`, `0xFF` introduce a little-endian `u16`, `u32`, `u64`
//! respectively.

use thiserror::Error;

/// Errors produced while decoding a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The input ended before the field could be read.
    #[error("unexpected end of input: needed {needed} more bytes")]
    UnexpectedEof {
        /// How many more bytes the field required.
        needed: usize,
    },

    /// A var-uint used a wider encoding than its value requires.
    #[error("non-canonical var-uint encoding")]
    NonCanonicalVarUint,

    /// The record decoded but bytes were left over.
    #[error("trailing bytes after decode: {0}")]
    TrailingBytes(usize),

    /// A field held a value outside its domain.
    #[error("invalid {what}: {detail}")]
    Invalid {
        /// Which field was invalid.
        what: &'static str,
        /// What was wrong with it.
        detail: String,
    },
}

/// Types that serialize into the deterministic byte format.
pub trait Encodable {
    /// Append this value's encoding to the writer.
    fn encode(&self, w: &mut ByteWriter);

    /// Encode into a fresh byte vector.
    fn to_vec(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }
}

/// Types that deserialize from the deterministic byte format.
pub trait Decodable: Sized {
    /// Read one value from the reader, advancing it.
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError>;

    /// Decode a value that must consume the entire input.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(bytes);
        let value = Self::decode(&mut r)?;
        r.expect_end()?;
        Ok(value)
    }
}

/// Append-only byte sink.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with pre-allocated capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append raw bytes verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Append a little-endian `u16`.
    pub fn write_u16_le(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a little-endian `u32`.
    pub fn write_u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a little-endian `u64`.
    pub fn write_u64_le(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a big-endian `u32`.
    ///
    /// Used for key components that must sort numerically under
    /// lexicographic byte order (e.g. header-hash-list chunk keys).
    pub fn write_u32_be(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a compact var-uint.
    pub fn write_var_uint(&mut self, v: u64) {
        match v {
            0..=0xFC => self.write_u8(v as u8),
            0xFD..=0xFFFF => {
                self.write_u8(0xFD);
                self.write_u16_le(v as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.write_u8(0xFE);
                self.write_u32_le(v as u32);
            }
            _ => {
                self.write_u8(0xFF);
                self.write_u64_le(v);
            }
        }
    }

    /// Append a length-prefixed byte string.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_var_uint(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn write_var_string(&mut self, s: &str) {
        self.write_var_bytes(s.as_bytes());
    }
}

/// Cursor over an encoded record.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Wrap a byte slice for reading.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the entire input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail unless the entire input has been consumed.
    pub fn expect_end(&self) -> Result<(), CodecError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.remaining()))
        }
    }

    /// Read exactly `n` bytes.
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                needed: n - self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_exact(1)?[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        let b = self.read_exact(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        let b = self.read_exact(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64, CodecError> {
        let b = self.read_exact(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a big-endian `u32`.
    pub fn read_u32_be(&mut self) -> Result<u32, CodecError> {
        let b = self.read_exact(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a compact var-uint, rejecting non-canonical encodings.
    pub fn read_var_uint(&mut self) -> Result<u64, CodecError> {
        let tag = self.read_u8()?;
        match tag {
            0..=0xFC => Ok(tag as u64),
            0xFD => {
                let v = self.read_u16_le()? as u64;
                if v < 0xFD {
                    return Err(CodecError::NonCanonicalVarUint);
                }
                Ok(v)
            }
            0xFE => {
                let v = self.read_u32_le()? as u64;
                if v <= 0xFFFF {
                    return Err(CodecError::NonCanonicalVarUint);
                }
                Ok(v)
            }
            0xFF => {
                let v = self.read_u64_le()?;
                if v <= 0xFFFF_FFFF {
                    return Err(CodecError::NonCanonicalVarUint);
                }
                Ok(v)
            }
        }
    }

    /// Read a length-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_var_uint()?;
        let len = usize::try_from(len).map_err(|_| CodecError::Invalid {
            what: "var-bytes length",
            detail: format!("{len} does not fit in memory"),
        })?;
        Ok(self.read_exact(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_var_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_var_bytes()?;
        String::from_utf8(bytes).map_err(|e| CodecError::Invalid {
            what: "string",
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_roundtrip() {
        let mut w = ByteWriter::new();
        w.write_u8(0xAB);
        w.write_u16_le(0x1234);
        w.write_u32_le(0xDEADBEEF);
        w.write_u64_le(0x0102030405060708);
        w.write_u32_be(7);
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16_le().unwrap(), 0x1234);
        assert_eq!(r.read_u32_le().unwrap(), 0xDEADBEEF);
        assert_eq!(r.read_u64_le().unwrap(), 0x0102030405060708);
        assert_eq!(r.read_u32_be().unwrap(), 7);
        r.expect_end().unwrap();
    }

    #[test]
    fn test_u32_be_sorts_numerically() {
        let encode = |v: u32| {
            let mut w = ByteWriter::new();
            w.write_u32_be(v);
            w.into_bytes()
        };
        assert!(encode(1) < encode(2));
        assert!(encode(255) < encode(256));
        assert!(encode(2000) < encode(4000));
    }

    #[test]
    fn test_var_uint_boundaries() {
        for v in [0u64, 1, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, u64::MAX] {
            let mut w = ByteWriter::new();
            w.write_var_uint(v);
            let bytes = w.into_bytes();
            let mut r = ByteReader::new(&bytes);
            assert_eq!(r.read_var_uint().unwrap(), v, "round-trip for {v}");
            r.expect_end().unwrap();
        }
    }

    #[test]
    fn test_var_uint_rejects_non_canonical() {
        // 5 encoded with the 0xFD (u16) form instead of a single byte.
        let bytes = [0xFD, 0x05, 0x00];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_var_uint(), Err(CodecError::NonCanonicalVarUint));
    }

    #[test]
    fn test_var_bytes_roundtrip() {
        let mut w = ByteWriter::new();
        w.write_var_bytes(b"hello");
        w.write_var_string("world");
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_var_bytes().unwrap(), b"hello");
        assert_eq!(r.read_var_string().unwrap(), "world");
    }

    #[test]
    fn test_eof_reports_shortfall() {
        let mut r = ByteReader::new(&[1, 2]);
        assert_eq!(r.read_u32_le(), Err(CodecError::UnexpectedEof { needed: 2 }));
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let r = ByteReader::new(&[0]);
        assert_eq!(r.expect_end(), Err(CodecError::TrailingBytes(1)));
    }
}
