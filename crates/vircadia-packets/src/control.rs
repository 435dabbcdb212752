//! Control packet codec.
//!
//! Control packets are a separate, smaller framing that bypasses the
//! session layer: a single leading bit marks "control", the following bits
//! carry a small type enum, and the body is type-specific. No obfuscation,
//! no source ID, no sequence/message words.
//!
//! ```text
//! word 0 (u32 LE):  bit 31 = 1 (control flag), bits 16-30 = control type
//! body:             Ack / Handshake / HandshakeAck carry a 4-byte LE
//!                   sequence number; HandshakeRequest has no body
//! ```
//!
//! The vocabulary implies a sliding-window reliable-delivery scheme, but
//! application packets only ever travel the unreliable channel today; this
//! codec is kept complete so a future reliability layer has its wire format
//! ready.

use crate::error::PacketError;
use crate::header::CONTROL_BIT;
use crate::raw::RawPacket;
use vircadia_codec::{SequenceNumber, WireReader, WireWriter};

const TYPE_SHIFT: u32 = 16;
const TYPE_MASK: u32 = 0x7FFF;

/// Control packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ControlPacketType {
    /// Acknowledge receipt up to a sequence number
    Ack = 0,
    /// Open a conversation, carrying the initial sequence number
    Handshake = 1,
    /// Acknowledge a handshake
    HandshakeAck = 2,
    /// Ask the peer to (re)send its handshake
    HandshakeRequest = 3,
}

impl TryFrom<u16> for ControlPacketType {
    type Error = PacketError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ControlPacketType::Ack),
            1 => Ok(ControlPacketType::Handshake),
            2 => Ok(ControlPacketType::HandshakeAck),
            3 => Ok(ControlPacketType::HandshakeRequest),
            other => Err(PacketError::InvalidControlType(other)),
        }
    }
}

impl ControlPacketType {
    fn carries_sequence(self) -> bool {
        !matches!(self, ControlPacketType::HandshakeRequest)
    }
}

/// A decoded or to-be-sent control packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPacket {
    /// The control type
    pub control_type: ControlPacketType,
    /// Sequence number body, absent for HandshakeRequest
    pub sequence_number: Option<SequenceNumber>,
}

impl ControlPacket {
    /// A Handshake carrying the initial send sequence number.
    #[must_use]
    pub fn handshake(initial: SequenceNumber) -> Self {
        Self {
            control_type: ControlPacketType::Handshake,
            sequence_number: Some(initial),
        }
    }

    /// A HandshakeAck echoing the peer's initial sequence number.
    #[must_use]
    pub fn handshake_ack(initial: SequenceNumber) -> Self {
        Self {
            control_type: ControlPacketType::HandshakeAck,
            sequence_number: Some(initial),
        }
    }

    /// An Ack up to and including `sequence`.
    #[must_use]
    pub fn ack(sequence: SequenceNumber) -> Self {
        Self {
            control_type: ControlPacketType::Ack,
            sequence_number: Some(sequence),
        }
    }

    /// A HandshakeRequest.
    #[must_use]
    pub fn handshake_request() -> Self {
        Self {
            control_type: ControlPacketType::HandshakeRequest,
            sequence_number: None,
        }
    }

    /// Wire size of this packet.
    #[must_use]
    pub fn size(&self) -> usize {
        if self.control_type.carries_sequence() {
            8
        } else {
            4
        }
    }

    /// Encode into a fresh [`RawPacket`].
    #[must_use]
    pub fn encode(&self) -> RawPacket {
        let mut packet = RawPacket::for_send(self.size());
        packet.write_with(|w| self.encode_into(w));
        packet
    }

    fn encode_into(&self, w: &mut WireWriter<'_>) {
        w.write_u32_le(CONTROL_BIT | (u32::from(self.control_type as u16) << TYPE_SHIFT));
        if self.control_type.carries_sequence() {
            // 4-byte little-endian body even though sequence numbers are
            // 16-bit; the high half is zero on the wire
            let seq = self.sequence_number.unwrap_or_default();
            w.write_u32_le(u32::from(seq.to_raw()));
        }
    }

    /// Decode from received bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut r = WireReader::new(bytes);
        let word = r.read_u32_le()?;
        if word & CONTROL_BIT == 0 {
            return Err(PacketError::ControlBitMismatch { expected: "control" });
        }
        let control_type = ControlPacketType::try_from(((word >> TYPE_SHIFT) & TYPE_MASK) as u16)?;
        let sequence_number = if control_type.carries_sequence() {
            Some(SequenceNumber::new((r.read_u32_le()? & 0xFFFF) as u16))
        } else {
            None
        };
        Ok(Self {
            control_type,
            sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_fixture() {
        let packet = ControlPacket::handshake(SequenceNumber::new(7)).encode();
        assert_eq!(hex::encode(packet.as_bytes()), "0000018007000000");
    }

    #[test]
    fn test_handshake_roundtrip() {
        for seq in [0u16, 7, 0x1234, 0xFFFF] {
            let encoded = ControlPacket::handshake(SequenceNumber::new(seq)).encode();
            let decoded = ControlPacket::decode(encoded.as_bytes()).unwrap();
            assert_eq!(decoded.control_type, ControlPacketType::Handshake);
            assert_eq!(decoded.sequence_number, Some(SequenceNumber::new(seq)));
        }
    }

    #[test]
    fn test_all_types_roundtrip() {
        let packets = [
            ControlPacket::ack(SequenceNumber::new(99)),
            ControlPacket::handshake(SequenceNumber::new(1)),
            ControlPacket::handshake_ack(SequenceNumber::new(1)),
            ControlPacket::handshake_request(),
        ];
        for p in packets {
            let decoded = ControlPacket::decode(p.encode().as_bytes()).unwrap();
            assert_eq!(decoded, p);
        }
    }

    #[test]
    fn test_handshake_request_is_four_bytes() {
        assert_eq!(ControlPacket::handshake_request().encode().len(), 4);
    }

    #[test]
    fn test_data_packet_rejected() {
        // Control bit clear
        let bytes = [0x07, 0x00, 0x00, 0x00];
        assert!(matches!(
            ControlPacket::decode(&bytes),
            Err(PacketError::ControlBitMismatch { expected: "control" })
        ));
    }

    #[test]
    fn test_undefined_control_type_rejected() {
        // Control bit + type 9
        let word: u32 = (1 << 31) | (9 << 16);
        let mut bytes = word.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 4]);
        assert!(matches!(
            ControlPacket::decode(&bytes),
            Err(PacketError::InvalidControlType(9))
        ));
    }

    #[test]
    fn test_truncated_control_packet() {
        assert!(ControlPacket::decode(&[0x00, 0x00]).is_err());
    }
}
