//! Property-based tests for the Vircadia protocol stack.
//!
//! Uses proptest to verify wire-format invariants across large input
//! spaces, plus the byte-exact fixtures the external contract pins down.

use proptest::prelude::*;

// ============================================================================
// Sequence number properties
// ============================================================================

mod sequence_properties {
    use super::*;
    use vircadia_codec::SequenceNumber;

    /// Half-range threshold comparator, straight from the definition.
    fn reference_is_before(a: u16, b: u16) -> bool {
        if a == b {
            return false;
        }
        if a < b {
            b - a <= 0x8000
        } else {
            a - b > 0x8000
        }
    }

    proptest! {
        #[test]
        fn wraparound_ordering_matches_reference(a in any::<u16>(), b in any::<u16>()) {
            prop_assert_eq!(
                SequenceNumber::new(a).is_before(SequenceNumber::new(b)),
                reference_is_before(a, b)
            );
        }

        #[test]
        fn increment_preserves_ordering(a in any::<u16>()) {
            let s = SequenceNumber::new(a);
            prop_assert!(s.is_before(s.next()));
            prop_assert!(!s.next().is_before(s));
        }
    }

    #[test]
    fn test_increment_at_max_wraps_to_zero() {
        assert_eq!(SequenceNumber::new(0xFFFF).next(), SequenceNumber::new(0));
    }
}

// ============================================================================
// Obfuscation properties
// ============================================================================

mod obfuscation_properties {
    use super::*;
    use vircadia_packets::{ObfuscationLevel, PacketType, RawPacket, SessionPacket};

    const LEVELS: [ObfuscationLevel; 4] = [
        ObfuscationLevel::None,
        ObfuscationLevel::Level1,
        ObfuscationLevel::Level2,
        ObfuscationLevel::Level3,
    ];

    proptest! {
        /// For all payloads and level pairs, obfuscating L1 -> L2 -> L1
        /// reproduces the original bytes exactly.
        #[test]
        fn obfuscation_round_trips(
            payload in prop::collection::vec(any::<u8>(), 0..512),
            from in 0usize..4,
            to in 0usize..4,
        ) {
            let mut packet = SessionPacket::create(PacketType::AvatarIdentity, Some(payload.len()));
            packet.raw_mut().write_bytes(&payload);
            let original = packet.as_bytes().to_vec();

            packet.obfuscate(LEVELS[from]);
            packet.obfuscate(LEVELS[to]);
            packet.obfuscate(LEVELS[from]);
            packet.obfuscate(ObfuscationLevel::None);
            prop_assert_eq!(packet.as_bytes(), &original[..]);
        }

        /// A nonzero level actually changes a nonempty payload.
        #[test]
        fn obfuscation_scrambles(payload in prop::collection::vec(any::<u8>(), 16..128)) {
            let mut packet = SessionPacket::create(PacketType::AvatarIdentity, Some(payload.len()));
            packet.raw_mut().write_bytes(&payload);
            let original = packet.as_bytes().to_vec();

            packet.obfuscate(ObfuscationLevel::Level2);
            prop_assert_ne!(packet.as_bytes(), &original[..]);
        }
    }

    /// Obfuscated packets survive a receive-side decode (which restores
    /// plaintext before parsing the session header).
    #[test]
    fn test_obfuscated_receive_roundtrip() {
        let mut packet = SessionPacket::create(PacketType::AvatarIdentity, Some(8));
        packet.raw_mut().write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        packet.write_source_id(31);
        let plain = packet.as_bytes().to_vec();
        packet.obfuscate(ObfuscationLevel::Level3);

        let decoded = SessionPacket::from_raw(RawPacket::from_received(
            packet.as_bytes().to_vec(),
            "0.0.0.0:1".parse().unwrap(),
        ))
        .unwrap();
        assert_eq!(decoded.as_bytes(), &plain[..]);
        assert_eq!(decoded.source_id(), Some(31));
    }
}

// ============================================================================
// Header invariants and byte-exact fixtures
// ============================================================================

mod header_fixtures {
    use super::*;
    use vircadia_codec::SequenceNumber;
    use vircadia_packets::{total_header_size, ControlPacket, ControlPacketType};

    #[test]
    fn test_header_size_invariants() {
        assert_eq!(total_header_size(false), 4);
        assert_eq!(total_header_size(true), 12);
    }

    #[test]
    fn test_handshake_fixture_bytes() {
        let packet = ControlPacket::handshake(SequenceNumber::new(7)).encode();
        assert_eq!(hex::encode(packet.as_bytes()), "0000018007000000");
    }

    proptest! {
        #[test]
        fn handshake_roundtrip(seq in any::<u16>()) {
            let encoded = ControlPacket::handshake(SequenceNumber::new(seq)).encode();
            let decoded = ControlPacket::decode(encoded.as_bytes()).unwrap();
            prop_assert_eq!(decoded.control_type, ControlPacketType::Handshake);
            prop_assert_eq!(decoded.sequence_number, Some(SequenceNumber::new(seq)));
        }
    }
}

// ============================================================================
// Multi-packet message assembly
// ============================================================================

mod message_properties {
    use super::*;
    use vircadia_codec::{SequenceNumber, WireWriter};
    use vircadia_packets::{
        MessageHeader, PacketPosition, PacketType, RawPacket, ReceivedMessage, SessionPacket,
        TransportHeader,
    };

    fn message_packet(part_number: u32, total: u32, chunk: &[u8]) -> SessionPacket {
        let position = if total == 1 {
            PacketPosition::Only
        } else if part_number == 0 {
            PacketPosition::First
        } else if part_number == total - 1 {
            PacketPosition::Last
        } else {
            PacketPosition::Middle
        };
        let header = TransportHeader {
            is_reliable: false,
            obfuscation_level: Default::default(),
            sequence_number: SequenceNumber::new(part_number as u16),
            message: Some(MessageHeader {
                message_number: 77,
                position,
                part_number,
            }),
        };

        // 12-byte header, 2-byte session sub-header, then the chunk
        let mut raw = RawPacket::for_send(12 + 2 + chunk.len());
        raw.write_with(|w: &mut WireWriter<'_>| header.encode(w));
        raw.write_u8(PacketType::DomainList as u8);
        raw.write_u8(PacketType::DomainList.version());
        raw.write_bytes(chunk);

        SessionPacket::from_raw(RawPacket::from_received(
            raw.into_bytes(),
            "0.0.0.0:4".parse().unwrap(),
        ))
        .unwrap()
    }

    proptest! {
        /// Assembly reproduces the original bytes for any chunking and any
        /// arrival order.
        #[test]
        fn assembly_is_order_independent(
            data in prop::collection::vec(any::<u8>(), 1..256),
            chunk_size in 1usize..64,
            seed in any::<u64>(),
        ) {
            let chunks: Vec<&[u8]> = data.chunks(chunk_size).collect();
            let total = chunks.len() as u32;
            let packets: Vec<SessionPacket> = chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| message_packet(i as u32, total, chunk))
                .collect();

            // Deterministic shuffle from the seed
            let mut order: Vec<usize> = (0..packets.len()).collect();
            let mut state = seed;
            for i in (1..order.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                order.swap(i, (state % (i as u64 + 1)) as usize);
            }

            let mut iter = order.into_iter();
            let first = iter.next().unwrap();
            let mut message = ReceivedMessage::from_packet(&packets[first]);
            for index in iter {
                prop_assert!(!message.is_complete());
                message.append_packet(&packets[index]);
            }

            prop_assert!(message.is_complete());
            prop_assert_eq!(message.num_packets(), total);
            prop_assert_eq!(message.data(), data);
        }
    }
}
