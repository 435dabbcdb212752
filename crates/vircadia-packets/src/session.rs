//! Transport and session packet layers over [`RawPacket`].
//!
//! [`TransportPacket`] owns the transport header (reliability, obfuscation,
//! sequence/message numbers); [`SessionPacket`] adds the session sub-header
//! (packet type, version, and - for sourced types - the sender's local ID).
//! The layers extend each other by composition, mirroring the wire layout.

use crate::header::{ObfuscationLevel, TransportHeader};
use crate::obfuscate;
use crate::raw::RawPacket;
use crate::types::PacketType;
use crate::{Result, MAX_PACKET_SIZE};
use vircadia_codec::{SequenceNumber, WireReader, WireWriter};

/// Size of the session sub-header for `packet_type`.
#[must_use]
pub fn session_header_size(packet_type: PacketType) -> usize {
    // type byte + version byte, then the source local ID for sourced types
    if packet_type.is_sourced() {
        4
    } else {
        2
    }
}

/// A packet with decoded transport framing.
#[derive(Debug, Clone)]
pub struct TransportPacket {
    raw: RawPacket,
    header: TransportHeader,
}

impl TransportPacket {
    /// Allocate an outgoing packet with `payload_capacity` bytes after the
    /// transport header.
    #[must_use]
    pub fn create(header: TransportHeader, payload_capacity: usize) -> Self {
        let mut raw = RawPacket::for_send(header.size() + payload_capacity);
        raw.write_with(|w| header.encode(w));
        Self { raw, header }
    }

    /// Decode the transport framing of a received packet.
    ///
    /// The packet cursor is left at the first payload byte.
    pub fn from_raw(mut raw: RawPacket) -> Result<Self> {
        let mut r = WireReader::new(raw.as_bytes());
        let header = TransportHeader::decode(&mut r)?;
        let consumed = r.position();
        raw.seek(consumed);
        Ok(Self { raw, header })
    }

    /// The decoded transport header.
    #[must_use]
    pub fn header(&self) -> &TransportHeader {
        &self.header
    }

    /// Payload bytes (everything after the transport header).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.raw.as_bytes()[self.header.size()..]
    }

    /// Rewrite the sequence number, preserving the other header fields.
    ///
    /// The sender assigns sequence numbers at send time, after the packet
    /// body has been built.
    pub fn write_sequence_number(&mut self, sequence_number: SequenceNumber) {
        self.header.sequence_number = sequence_number;
        self.rewrite_header();
    }

    /// Re-scramble the payload to `target` level and record it in the
    /// header.
    ///
    /// Repeated and inverse calls are lossless; obfuscating from level L1
    /// to L2 and back to L1 reproduces the original bytes exactly.
    pub fn obfuscate(&mut self, target: ObfuscationLevel) {
        let current = self.header.obfuscation_level;
        if current == target {
            return;
        }
        let header_size = self.header.size();
        obfuscate::transcode(
            &mut self.raw.as_mut_bytes()[header_size..],
            current,
            target,
        );
        self.header.obfuscation_level = target;
        self.rewrite_header();
    }

    fn rewrite_header(&mut self) {
        let mut w = WireWriter::new(self.raw.as_mut_bytes());
        self.header.encode(&mut w);
    }

    /// Borrow the underlying raw packet.
    #[must_use]
    pub fn raw(&self) -> &RawPacket {
        &self.raw
    }

    /// Mutable access to the underlying raw packet (cursor writes land in
    /// the payload region).
    pub fn raw_mut(&mut self) -> &mut RawPacket {
        &mut self.raw
    }

    /// Consume into the underlying raw packet.
    #[must_use]
    pub fn into_raw(self) -> RawPacket {
        self.raw
    }
}

/// A packet with decoded transport and session framing.
#[derive(Debug, Clone)]
pub struct SessionPacket {
    transport: TransportPacket,
    packet_type: PacketType,
    version: u8,
    source_id: Option<u16>,
}

impl SessionPacket {
    /// Allocate an outgoing packet of `packet_type`.
    ///
    /// `payload_capacity` is the application payload size; `None` allocates
    /// the maximum the transport will carry. The cursor is left at the
    /// first application payload byte; the source ID (for sourced types)
    /// starts zeroed and is patched at send time.
    #[must_use]
    pub fn create(packet_type: PacketType, payload_capacity: Option<usize>) -> Self {
        let header = TransportHeader::new(SequenceNumber::new(0));
        let session_size = session_header_size(packet_type);
        let payload = payload_capacity
            .unwrap_or(MAX_PACKET_SIZE - header.size() - session_size);
        let mut transport = TransportPacket::create(header, session_size + payload);

        let version = packet_type.version();
        transport.raw_mut().write_u8(packet_type as u8);
        transport.raw_mut().write_u8(version);
        let source_id = if packet_type.is_sourced() {
            transport.raw_mut().write_u16_le(0);
            Some(0)
        } else {
            None
        };

        Self {
            transport,
            packet_type,
            version,
            source_id,
        }
    }

    /// Decode the session framing of a received transport packet.
    ///
    /// Obfuscated payloads are restored to plaintext first - the session
    /// sub-header itself is covered by obfuscation.
    pub fn from_transport(mut transport: TransportPacket) -> Result<Self> {
        if transport.header().obfuscation_level != ObfuscationLevel::None {
            tracing::trace!(
                level = ?transport.header().obfuscation_level,
                "deobfuscating received packet"
            );
            transport.obfuscate(ObfuscationLevel::None);
        }

        let type_byte = transport.raw_mut().read_with(|r| r.read_u8())?;
        let packet_type = PacketType::try_from(type_byte)?;
        let version = transport.raw_mut().read_with(|r| r.read_u8())?;
        let source_id = if packet_type.is_sourced() {
            Some(transport.raw_mut().read_with(|r| r.read_u16_le())?)
        } else {
            None
        };

        Ok(Self {
            transport,
            packet_type,
            version,
            source_id,
        })
    }

    /// Decode a received datagram through both framing layers.
    pub fn from_raw(raw: RawPacket) -> Result<Self> {
        Self::from_transport(TransportPacket::from_raw(raw)?)
    }

    /// The session packet type.
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// The version byte carried for this type.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The sender's local ID; `None` for unsourced types.
    #[must_use]
    pub fn source_id(&self) -> Option<u16> {
        self.source_id
    }

    /// Application payload bytes (after both headers).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.transport.payload()[session_header_size(self.packet_type)..]
    }

    /// Offset of the application payload within the whole packet.
    #[must_use]
    pub fn payload_offset(&self) -> usize {
        self.transport.header().size() + session_header_size(self.packet_type)
    }

    /// Patch the source local ID of a sourced outgoing packet.
    pub fn write_source_id(&mut self, source_id: u16) {
        assert!(
            self.packet_type.is_sourced(),
            "source ID on unsourced packet type {}",
            self.packet_type
        );
        let offset = self.transport.header().size() + 2;
        let mut w = WireWriter::new(&mut self.transport.raw_mut().as_mut_bytes()[offset..]);
        w.write_u16_le(source_id);
        self.source_id = Some(source_id);
    }

    /// Assign the send-time sequence number.
    pub fn write_sequence_number(&mut self, sequence_number: SequenceNumber) {
        self.transport.write_sequence_number(sequence_number);
    }

    /// Re-scramble the payload (session sub-header included) to `target`.
    pub fn obfuscate(&mut self, target: ObfuscationLevel) {
        self.transport.obfuscate(target);
    }

    /// Borrow the transport layer.
    #[must_use]
    pub fn transport(&self) -> &TransportPacket {
        &self.transport
    }

    /// Mutable access to the underlying raw packet for payload writes.
    pub fn raw_mut(&mut self) -> &mut RawPacket {
        self.transport.raw_mut()
    }

    /// The full wire image.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.transport.raw().as_bytes()
    }
}
