//! Assembly of multi-packet messages.
//!
//! Large application messages are split across packets sharing a message
//! number. The underlying channel is unordered, so parts can arrive in any
//! order; assembly keys parts by their part number and completes once the
//! final part is known and no gaps remain.

use crate::header::PacketPosition;
use crate::session::SessionPacket;
use crate::types::PacketType;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

/// One logical message, aggregated from one or more packets.
#[derive(Debug)]
pub struct ReceivedMessage {
    packet_type: PacketType,
    version: u8,
    source_id: Option<u16>,
    sender: SocketAddr,
    message_number: Option<u32>,
    parts: BTreeMap<u32, Vec<u8>>,
    last_part_number: Option<u32>,
    num_packets: u32,
    complete: bool,
    first_packet_received_at: Option<Instant>,
}

impl ReceivedMessage {
    /// Start a message from its first received packet.
    ///
    /// A packet that is not part of a multi-packet message (or is marked
    /// ONLY) completes immediately.
    #[must_use]
    pub fn from_packet(packet: &SessionPacket) -> Self {
        let header = packet.transport().header();
        let message_number = header.message.map(|m| m.message_number);
        let mut message = Self {
            packet_type: packet.packet_type(),
            version: packet.version(),
            source_id: packet.source_id(),
            sender: packet.transport().raw().sender(),
            message_number,
            parts: BTreeMap::new(),
            last_part_number: None,
            num_packets: 0,
            complete: false,
            first_packet_received_at: packet.transport().raw().received_at(),
        };
        message.append_packet(packet);
        message
    }

    /// Incorporate a further packet of the same message.
    ///
    /// Duplicate part numbers replace the earlier copy and do not bump the
    /// packet count.
    pub fn append_packet(&mut self, packet: &SessionPacket) {
        let header = packet.transport().header();
        let (position, part_number) = match header.message {
            Some(m) => (m.position, m.part_number),
            None => (PacketPosition::Only, 0),
        };

        debug_assert_eq!(
            header.message.map(|m| m.message_number),
            self.message_number,
            "packet appended to the wrong message"
        );

        if self.parts.insert(part_number, packet.payload().to_vec()).is_none() {
            self.num_packets += 1;
        }

        match position {
            PacketPosition::Only => {
                self.last_part_number = Some(part_number);
            }
            PacketPosition::Last => {
                self.last_part_number = Some(part_number);
            }
            PacketPosition::First | PacketPosition::Middle => {}
        }

        if let Some(last) = self.last_part_number {
            // Complete once every part up to the final one is present
            self.complete = self.parts.len() as u64 == u64::from(last) + 1;
        }
    }

    /// The session packet type.
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// The session version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The sender's local ID, if the type is sourced.
    #[must_use]
    pub fn source_id(&self) -> Option<u16> {
        self.source_id
    }

    /// The sender address of the first packet.
    #[must_use]
    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    /// Message number; `None` for single-packet messages without message
    /// framing.
    #[must_use]
    pub fn message_number(&self) -> Option<u32> {
        self.message_number
    }

    /// Packets incorporated so far.
    #[must_use]
    pub fn num_packets(&self) -> u32 {
        self.num_packets
    }

    /// True once the LAST (or ONLY) part and everything before it arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Receive timestamp of the first packet.
    #[must_use]
    pub fn first_packet_received_at(&self) -> Option<Instant> {
        self.first_packet_received_at
    }

    /// The assembled payload, parts concatenated in part-number order.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.parts.values().map(Vec::len).sum());
        for part in self.parts.values() {
            out.extend_from_slice(part);
        }
        out
    }
}
