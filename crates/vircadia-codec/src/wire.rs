//! Cursor-based primitive reads and writes with explicit endianness.
//!
//! The domain server's wire format mixes conventions: packet header words
//! are little-endian, application body fields are big-endian, and strings
//! travel as length-prefixed UTF-16. [`WireReader`] and [`WireWriter`] make
//! the endianness of every access explicit at the call site.
//!
//! Length prefixes are 4-byte big-endian byte counts; the all-ones value
//! `0xFFFF_FFFF` encodes a null string or blob, distinct from an empty one.

use crate::{CodecError, Result};
use uuid::Uuid;

/// Length-prefix sentinel for a null string or blob.
pub const NULL_LENGTH: u32 = 0xFFFF_FFFF;

/// A reading cursor over received bytes.
///
/// Every read advances the cursor and fails with [`CodecError::Truncated`]
/// rather than panicking when the input ends early - truncated packets are
/// protocol violations to report, not crashes.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader over `buf`, positioned at its start.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n)?;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                offset: self.pos,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a big-endian `u16`.
    pub fn read_u16_be(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian `u32`.
    pub fn read_u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a big-endian `u64`.
    pub fn read_u64_be(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read a 128-bit UUID in RFC byte order.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let b = self.take(16)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(b);
        Ok(Uuid::from_bytes(bytes))
    }

    /// Read a length-prefixed UTF-16BE string; `None` for the null sentinel.
    pub fn read_utf16_string(&mut self) -> Result<Option<String>> {
        let len = self.read_u32_be()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        let len = len as usize;
        if len % 2 != 0 {
            return Err(CodecError::OddUtf16Length(len));
        }
        if self.remaining() < len {
            return Err(CodecError::BadLengthPrefix {
                length: len,
                remaining: self.remaining(),
            });
        }
        let raw = self.take(len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let decoded: std::result::Result<String, _> =
            char::decode_utf16(units.into_iter()).collect();
        decoded.map(Some).map_err(|_| CodecError::InvalidUtf16)
    }

    /// Read a length-prefixed byte blob; `None` for the null sentinel.
    pub fn read_blob(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_u32_be()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        let len = len as usize;
        if self.remaining() < len {
            return Err(CodecError::BadLengthPrefix {
                length: len,
                remaining: self.remaining(),
            });
        }
        Ok(Some(self.take(len)?.to_vec()))
    }
}

/// A writing cursor over a fixed-capacity buffer.
///
/// Writing past the buffer's end panics: send capacities are computed in
/// advance from known field sizes, so an overflow is a bug in the caller,
/// never a runtime condition.
#[derive(Debug)]
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WireWriter<'a> {
    /// Create a writer over `buf`, positioned at its start.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current write offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes of capacity left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn reserve(&mut self, n: usize) -> &mut [u8] {
        assert!(
            self.remaining() >= n,
            "write of {} bytes overflows buffer: {} of {} used",
            n,
            self.pos,
            self.buf.len()
        );
        let slice = &mut self.buf[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.reserve(1)[0] = v;
    }

    /// Write a little-endian `u16`.
    pub fn write_u16_le(&mut self, v: u16) {
        self.reserve(2).copy_from_slice(&v.to_le_bytes());
    }

    /// Write a big-endian `u16`.
    pub fn write_u16_be(&mut self, v: u16) {
        self.reserve(2).copy_from_slice(&v.to_be_bytes());
    }

    /// Write a little-endian `u32`.
    pub fn write_u32_le(&mut self, v: u32) {
        self.reserve(4).copy_from_slice(&v.to_le_bytes());
    }

    /// Write a big-endian `u32`.
    pub fn write_u32_be(&mut self, v: u32) {
        self.reserve(4).copy_from_slice(&v.to_be_bytes());
    }

    /// Write a little-endian `u64`.
    pub fn write_u64_le(&mut self, v: u64) {
        self.reserve(8).copy_from_slice(&v.to_le_bytes());
    }

    /// Write a big-endian `u64`.
    pub fn write_u64_be(&mut self, v: u64) {
        self.reserve(8).copy_from_slice(&v.to_be_bytes());
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len()).copy_from_slice(bytes);
    }

    /// Write a 128-bit UUID in RFC byte order.
    pub fn write_uuid(&mut self, uuid: &Uuid) {
        self.write_bytes(uuid.as_bytes());
    }

    /// Write a length-prefixed UTF-16BE string; `None` writes the null
    /// sentinel.
    pub fn write_utf16_string(&mut self, s: Option<&str>) {
        match s {
            None => self.write_u32_be(NULL_LENGTH),
            Some(s) => {
                let units: Vec<u16> = s.encode_utf16().collect();
                self.write_u32_be((units.len() * 2) as u32);
                for unit in units {
                    self.write_u16_be(unit);
                }
            }
        }
    }

    /// Write a length-prefixed byte blob; `None` writes the null sentinel.
    pub fn write_blob(&mut self, blob: Option<&[u8]>) {
        match blob {
            None => self.write_u32_be(NULL_LENGTH),
            Some(b) => {
                self.write_u32_be(b.len() as u32);
                self.write_bytes(b);
            }
        }
    }
}

/// Byte size of a UTF-16 string field including its length prefix.
#[must_use]
pub fn utf16_field_size(s: Option<&str>) -> usize {
    match s {
        None => 4,
        Some(s) => 4 + s.encode_utf16().count() * 2,
    }
}

/// Byte size of a blob field including its length prefix.
#[must_use]
pub fn blob_field_size(blob: Option<&[u8]>) -> usize {
    match blob {
        None => 4,
        Some(b) => 4 + b.len(),
    }
}
