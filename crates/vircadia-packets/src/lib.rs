//! # Vircadia Packets
//!
//! Packet framing for the Vircadia wire protocol. The format is fixed and
//! externally defined by the domain server; this crate reproduces it
//! bit-exactly.
//!
//! Three framing layers build on one another:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ SessionPacket   packet type, version, source node local ID  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ TransportPacket reliability, obfuscation level, sequence /  │
//! │                 message numbers, multi-packet position      │
//! ├─────────────────────────────────────────────────────────────┤
//! │ RawPacket       owned byte buffer, cursor, sender address,  │
//! │                 receive timestamp                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ControlPacket`] is a separate, smaller framing (ACK / Handshake
//! family) that bypasses the session layer entirely.
//!
//! All packet header words are **little-endian** `u32` values; application
//! body fields are big-endian unless a field states otherwise.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod control;
pub mod error;
pub mod header;
pub mod message;
pub mod obfuscate;
pub mod raw;
pub mod session;
pub mod types;

pub use control::{ControlPacket, ControlPacketType};
pub use error::PacketError;
pub use header::{total_header_size, MessageHeader, ObfuscationLevel, PacketPosition, TransportHeader};
pub use message::ReceivedMessage;
pub use raw::RawPacket;
pub use session::{SessionPacket, TransportPacket};
pub use types::{protocol_version_signature, NodeType, PacketType};

/// Largest packet this stack will frame, in bytes.
///
/// WebRTC data channel messages above the path MTU get fragmented by SCTP;
/// staying under the common 1200-byte ceiling keeps one packet per
/// datagram.
pub const MAX_PACKET_SIZE: usize = 1200;

/// Byte length of the protocol version signature.
pub const VERSION_SIGNATURE_SIZE: usize = 16;

/// Result type for packet operations.
pub type Result<T> = std::result::Result<T, PacketError>;
