//! The base framing layer: an owned buffer with a cursor.
//!
//! A [`RawPacket`] is created either for sending (empty buffer of a
//! precomputed capacity) or for receiving (wrapping the exact bytes that
//! arrived, stamped with the sender address and a receive timestamp). The
//! buffer length is fixed at construction and never grows.

use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;
use vircadia_codec::{Result as CodecResult, WireReader, WireWriter};

/// Sender placeholder for packets built locally.
fn unspecified_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

/// An owned packet buffer with a read/write cursor.
#[derive(Debug, Clone)]
pub struct RawPacket {
    buf: Vec<u8>,
    pos: usize,
    sender: SocketAddr,
    received_at: Option<Instant>,
}

impl RawPacket {
    /// Allocate an outgoing packet of exactly `capacity` bytes.
    ///
    /// The caller computes `capacity` from header and field sizes in
    /// advance; the cursor starts at zero so headers are written first.
    #[must_use]
    pub fn for_send(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            pos: 0,
            sender: unspecified_addr(),
            received_at: None,
        }
    }

    /// Wrap received bytes, stamping the sender and the receive time.
    #[must_use]
    pub fn from_received(bytes: Vec<u8>, sender: SocketAddr) -> Self {
        Self {
            buf: bytes,
            pos: 0,
            sender,
            received_at: Some(Instant::now()),
        }
    }

    /// Total buffer length (fixed at construction).
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True for zero-capacity packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current cursor offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Move the cursor to `pos`.
    pub fn seek(&mut self, pos: usize) {
        assert!(pos <= self.buf.len(), "seek past end of packet buffer");
        self.pos = pos;
    }

    /// Sender address (unspecified for locally built packets).
    #[must_use]
    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    /// Override the sender address.
    pub fn set_sender(&mut self, sender: SocketAddr) {
        self.sender = sender;
    }

    /// Receive timestamp; `None` for locally built packets.
    #[must_use]
    pub fn received_at(&self) -> Option<Instant> {
        self.received_at
    }

    /// The whole buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The whole buffer, mutable.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Consume into the underlying buffer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Run `f` with a writer positioned at the cursor, then advance the
    /// cursor past everything written.
    pub fn write_with<R>(&mut self, f: impl FnOnce(&mut WireWriter<'_>) -> R) -> R {
        let mut w = WireWriter::new(&mut self.buf[self.pos..]);
        let out = f(&mut w);
        self.pos += w.position();
        out
    }

    /// Run `f` with a reader positioned at the cursor, then advance the
    /// cursor past everything read. On error the cursor does not move.
    pub fn read_with<R>(
        &mut self,
        f: impl FnOnce(&mut WireReader<'_>) -> CodecResult<R>,
    ) -> CodecResult<R> {
        let mut r = WireReader::new(&self.buf[self.pos..]);
        let out = f(&mut r)?;
        self.pos += r.position();
        Ok(out)
    }

    /// Write a byte at the cursor.
    pub fn write_u8(&mut self, v: u8) {
        self.write_with(|w| w.write_u8(v));
    }

    /// Write a little-endian `u16` at the cursor.
    pub fn write_u16_le(&mut self, v: u16) {
        self.write_with(|w| w.write_u16_le(v));
    }

    /// Write a big-endian `u16` at the cursor.
    pub fn write_u16_be(&mut self, v: u16) {
        self.write_with(|w| w.write_u16_be(v));
    }

    /// Write a little-endian `u32` at the cursor.
    pub fn write_u32_le(&mut self, v: u32) {
        self.write_with(|w| w.write_u32_le(v));
    }

    /// Write a big-endian `u32` at the cursor.
    pub fn write_u32_be(&mut self, v: u32) {
        self.write_with(|w| w.write_u32_be(v));
    }

    /// Write a big-endian `u64` at the cursor.
    pub fn write_u64_be(&mut self, v: u64) {
        self.write_with(|w| w.write_u64_be(v));
    }

    /// Write raw bytes at the cursor.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_with(|w| w.write_bytes(bytes));
    }

    /// Write a UUID at the cursor.
    pub fn write_uuid(&mut self, uuid: &Uuid) {
        self.write_with(|w| w.write_uuid(uuid));
    }

    /// Write a length-prefixed UTF-16 string at the cursor.
    pub fn write_utf16_string(&mut self, s: Option<&str>) {
        self.write_with(|w| w.write_utf16_string(s));
    }

    /// Write a length-prefixed blob at the cursor.
    pub fn write_blob(&mut self, blob: Option<&[u8]>) {
        self.write_with(|w| w.write_blob(blob));
    }
}
