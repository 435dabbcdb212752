//! Error types for packet framing.

use thiserror::Error;
use vircadia_codec::CodecError;

/// Errors produced while parsing or building packets.
///
/// Every variant is a protocol violation: the offending packet is reported
/// and dropped, the connection stays up.
#[derive(Debug, Error)]
pub enum PacketError {
    /// Primitive decode failed
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Packet shorter than its mandatory header
    #[error("packet too short: expected at least {expected}, got {actual}")]
    TooShort {
        /// Minimum byte length required
        expected: usize,
        /// Actual byte length received
        actual: usize,
    },

    /// The control bit did not match the framing being parsed
    #[error("control bit mismatch: expected {expected} packet")]
    ControlBitMismatch {
        /// "control" or "data", whichever was being parsed
        expected: &'static str,
    },

    /// Control type bits held an undefined value
    #[error("invalid control packet type: {0}")]
    InvalidControlType(u16),

    /// Session packet type byte held an undefined value
    #[error("unknown packet type: {0}")]
    UnknownPacketType(u8),
}
