//! Transport header codec.
//!
//! The first little-endian `u32` word of every data packet:
//!
//! ```text
//! bit 31      control flag (0 for data packets)
//! bit 30      reliability flag
//! bit 29      part-of-message flag
//! bits 27-28  obfuscation level
//! bits 16-26  reserved, zero
//! bits 0-15   sequence number
//! ```
//!
//! When the part-of-message flag is set, two further words follow: the
//! message word (position in bits 30-31, message number in bits 0-29) and
//! the message part number. The header is 4 bytes without them, 12 with.

use crate::error::PacketError;
use vircadia_codec::{SequenceNumber, WireReader, WireWriter};

/// Control flag bit of the first header word.
pub(crate) const CONTROL_BIT: u32 = 1 << 31;
const RELIABILITY_BIT: u32 = 1 << 30;
const MESSAGE_BIT: u32 = 1 << 29;
const OBFUSCATION_SHIFT: u32 = 27;
const OBFUSCATION_MASK: u32 = 0b11 << OBFUSCATION_SHIFT;
const SEQUENCE_MASK: u32 = 0xFFFF;

const POSITION_SHIFT: u32 = 30;
const MESSAGE_NUMBER_MASK: u32 = (1 << 30) - 1;

/// Size of the transport header in bytes.
#[must_use]
pub fn total_header_size(is_part_of_message: bool) -> usize {
    if is_part_of_message {
        12
    } else {
        4
    }
}

/// Server-directed payload scrambling strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ObfuscationLevel {
    /// Payload bytes are in plaintext network form
    #[default]
    None = 0,
    /// First key stream
    Level1 = 1,
    /// Second key stream
    Level2 = 2,
    /// Third key stream
    Level3 = 3,
}

impl ObfuscationLevel {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => ObfuscationLevel::None,
            1 => ObfuscationLevel::Level1,
            2 => ObfuscationLevel::Level2,
            _ => ObfuscationLevel::Level3,
        }
    }
}

/// Position of a packet within a multi-packet message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PacketPosition {
    /// The whole message fits in this packet
    #[default]
    Only = 0,
    /// First packet of a multi-packet message
    First = 1,
    /// Interior packet
    Middle = 2,
    /// Final packet
    Last = 3,
}

impl PacketPosition {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => PacketPosition::Only,
            1 => PacketPosition::First,
            2 => PacketPosition::Middle,
            _ => PacketPosition::Last,
        }
    }
}

/// Message fields, present only for part-of-message packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Identifier shared by every packet of one logical message
    pub message_number: u32,
    /// This packet's place within the message
    pub position: PacketPosition,
    /// Zero-based index of this packet within the message
    pub part_number: u32,
}

/// Decoded transport framing metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    /// Reliability flag (the ACK vocabulary exists, delivery stays
    /// best-effort; see the control module)
    pub is_reliable: bool,
    /// Current payload obfuscation level
    pub obfuscation_level: ObfuscationLevel,
    /// Packet sequence number
    pub sequence_number: SequenceNumber,
    /// Multi-packet message fields, if any
    pub message: Option<MessageHeader>,
}

impl TransportHeader {
    /// An unreliable, unobfuscated, single-packet header.
    #[must_use]
    pub fn new(sequence_number: SequenceNumber) -> Self {
        Self {
            is_reliable: false,
            obfuscation_level: ObfuscationLevel::None,
            sequence_number,
            message: None,
        }
    }

    /// Derived flag: true when message fields are present.
    #[must_use]
    pub fn is_part_of_message(&self) -> bool {
        self.message.is_some()
    }

    /// Size of this header on the wire.
    #[must_use]
    pub fn size(&self) -> usize {
        total_header_size(self.is_part_of_message())
    }

    /// Encode into `w`.
    pub fn encode(&self, w: &mut WireWriter<'_>) {
        let mut word = u32::from(self.sequence_number.to_raw());
        if self.is_reliable {
            word |= RELIABILITY_BIT;
        }
        if self.message.is_some() {
            word |= MESSAGE_BIT;
        }
        word |= (self.obfuscation_level as u32) << OBFUSCATION_SHIFT;
        w.write_u32_le(word);

        if let Some(msg) = &self.message {
            debug_assert!(msg.message_number <= MESSAGE_NUMBER_MASK);
            w.write_u32_le(((msg.position as u32) << POSITION_SHIFT) | msg.message_number);
            w.write_u32_le(msg.part_number);
        }
    }

    /// Decode from `r`.
    ///
    /// Fails if the control flag is set - control packets use their own
    /// framing and must be discriminated before this point.
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self, PacketError> {
        let word = r.read_u32_le()?;
        if word & CONTROL_BIT != 0 {
            return Err(PacketError::ControlBitMismatch { expected: "data" });
        }

        let is_reliable = word & RELIABILITY_BIT != 0;
        let obfuscation_level = ObfuscationLevel::from_bits(word >> OBFUSCATION_SHIFT);
        let sequence_number = SequenceNumber::new((word & SEQUENCE_MASK) as u16);

        let message = if word & MESSAGE_BIT != 0 {
            let message_word = r.read_u32_le()?;
            let part_number = r.read_u32_le()?;
            Some(MessageHeader {
                message_number: message_word & MESSAGE_NUMBER_MASK,
                position: PacketPosition::from_bits(message_word >> POSITION_SHIFT),
                part_number,
            })
        } else {
            None
        };

        Ok(Self {
            is_reliable,
            obfuscation_level,
            sequence_number,
            message,
        })
    }

    /// True if `bytes` begin with the control flag set.
    pub fn peek_is_control(bytes: &[u8]) -> Result<bool, PacketError> {
        if bytes.len() < 4 {
            return Err(PacketError::TooShort {
                expected: 4,
                actual: bytes.len(),
            });
        }
        let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Ok(word & CONTROL_BIT != 0)
    }
}
