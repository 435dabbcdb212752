//! Protocol packet types and node type codes.
//!
//! Both tables are part of the external contract with the domain server.
//! The set of unsourced packet types is closed and known at compile time;
//! the per-type version bytes feed the 16-byte protocol version signature
//! sent in every connect request.

use crate::error::PacketError;
use crate::VERSION_SIGNATURE_SIZE;
use std::fmt::{Display, Formatter};

/// Session packet types understood by this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum PacketType {
    Unknown = 0,
    StunResponse = 1,
    DomainList = 2,
    Ping = 3,
    PingReply = 4,
    KillAvatar = 5,
    AvatarData = 6,
    InjectAudio = 7,
    MixedAudio = 8,
    MicrophoneAudioNoEcho = 9,
    MicrophoneAudioWithEcho = 10,
    BulkAvatarData = 11,
    SilentAudioFrame = 12,
    DomainListRequest = 13,
    RequestAssignment = 14,
    CreateAssignment = 15,
    DomainConnectionDenied = 16,
    MuteEnvironment = 17,
    AudioStreamStats = 18,
    DomainServerPathQuery = 19,
    DomainServerPathResponse = 20,
    DomainServerAddedNode = 21,
    IceServerPeerInformation = 22,
    IceServerQuery = 23,
    OctreeStats = 24,
    AvatarIdentity = 25,
    AvatarQuery = 26,
    DomainConnectRequest = 27,
    NodeJsonStats = 28,
    EntityData = 29,
    EntityQuery = 30,
    EntityAdd = 31,
    EntityErase = 32,
    EntityEdit = 33,
    DomainServerConnectionToken = 34,
    DomainDisconnectRequest = 35,
    DomainServerRemovedNode = 36,
    MessagesData = 37,
    MessagesSubscribe = 38,
    MessagesUnsubscribe = 39,
}

/// Every defined packet type, in wire-value order.
///
/// The version signature hashes this table; order matters.
pub const ALL_PACKET_TYPES: &[PacketType] = &[
    PacketType::Unknown,
    PacketType::StunResponse,
    PacketType::DomainList,
    PacketType::Ping,
    PacketType::PingReply,
    PacketType::KillAvatar,
    PacketType::AvatarData,
    PacketType::InjectAudio,
    PacketType::MixedAudio,
    PacketType::MicrophoneAudioNoEcho,
    PacketType::MicrophoneAudioWithEcho,
    PacketType::BulkAvatarData,
    PacketType::SilentAudioFrame,
    PacketType::DomainListRequest,
    PacketType::RequestAssignment,
    PacketType::CreateAssignment,
    PacketType::DomainConnectionDenied,
    PacketType::MuteEnvironment,
    PacketType::AudioStreamStats,
    PacketType::DomainServerPathQuery,
    PacketType::DomainServerPathResponse,
    PacketType::DomainServerAddedNode,
    PacketType::IceServerPeerInformation,
    PacketType::IceServerQuery,
    PacketType::OctreeStats,
    PacketType::AvatarIdentity,
    PacketType::AvatarQuery,
    PacketType::DomainConnectRequest,
    PacketType::NodeJsonStats,
    PacketType::EntityData,
    PacketType::EntityQuery,
    PacketType::EntityAdd,
    PacketType::EntityErase,
    PacketType::EntityEdit,
    PacketType::DomainServerConnectionToken,
    PacketType::DomainDisconnectRequest,
    PacketType::DomainServerRemovedNode,
    PacketType::MessagesData,
    PacketType::MessagesSubscribe,
    PacketType::MessagesUnsubscribe,
];

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ALL_PACKET_TYPES
            .get(value as usize)
            .copied()
            .filter(|t| *t as u8 == value)
            .ok_or(PacketError::UnknownPacketType(value))
    }
}

impl PacketType {
    /// Whether the session header carries the sender's local ID.
    ///
    /// The unsourced set is closed: every domain-negotiation and ICE type
    /// travels without a source ID, everything else is sourced.
    #[must_use]
    pub fn is_sourced(self) -> bool {
        !matches!(
            self,
            PacketType::Unknown
                | PacketType::StunResponse
                | PacketType::DomainList
                | PacketType::DomainListRequest
                | PacketType::DomainConnectRequest
                | PacketType::DomainConnectionDenied
                | PacketType::DomainServerPathQuery
                | PacketType::DomainServerPathResponse
                | PacketType::DomainServerAddedNode
                | PacketType::DomainServerConnectionToken
                | PacketType::DomainDisconnectRequest
                | PacketType::DomainServerRemovedNode
                | PacketType::IceServerPeerInformation
                | PacketType::IceServerQuery
        )
    }

    /// The version byte carried in this type's session header.
    ///
    /// Versions bump independently per type when a body layout changes;
    /// the connect-request signature pins the whole table.
    #[must_use]
    pub fn version(self) -> u8 {
        match self {
            PacketType::DomainList => 3,
            PacketType::DomainConnectRequest => 2,
            PacketType::DomainListRequest => 2,
            PacketType::DomainServerAddedNode => 2,
            PacketType::AvatarData | PacketType::BulkAvatarData | PacketType::AvatarIdentity => 5,
            PacketType::EntityData | PacketType::EntityEdit | PacketType::EntityAdd => 4,
            PacketType::MixedAudio
            | PacketType::InjectAudio
            | PacketType::MicrophoneAudioNoEcho
            | PacketType::MicrophoneAudioWithEcho
            | PacketType::SilentAudioFrame => 3,
            _ => 1,
        }
    }
}

impl Display for PacketType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// 16-byte digest of the packet-type version table.
///
/// Sent in every DomainConnectRequest; the domain server refuses clients
/// whose signature does not match its own table.
#[must_use]
pub fn protocol_version_signature() -> [u8; VERSION_SIGNATURE_SIZE] {
    let mut hasher = blake3::Hasher::new();
    for t in ALL_PACKET_TYPES {
        hasher.update(&[*t as u8, t.version()]);
    }
    let mut signature = [0u8; VERSION_SIGNATURE_SIZE];
    signature.copy_from_slice(&hasher.finalize().as_bytes()[..VERSION_SIGNATURE_SIZE]);
    signature
}

/// Service node types, identified on the wire by one-character codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// The domain server itself
    DomainServer,
    /// Entity (octree) server
    EntityServer,
    /// An interface client
    Agent,
    /// Audio mixer
    AudioMixer,
    /// Avatar mixer
    AvatarMixer,
    /// Asset server
    AssetServer,
    /// Message bus mixer
    MessagesMixer,
    /// Entity script server
    EntityScriptServer,
    /// Upstream audio mixer
    UpstreamAudioMixer,
    /// Upstream avatar mixer
    UpstreamAvatarMixer,
    /// Downstream audio mixer
    DownstreamAudioMixer,
    /// Downstream avatar mixer
    DownstreamAvatarMixer,
    /// Not yet assigned
    Unassigned,
}

impl NodeType {
    /// The one-character wire code.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            NodeType::DomainServer => 'D',
            NodeType::EntityServer => 'o',
            NodeType::Agent => 'I',
            NodeType::AudioMixer => 'M',
            NodeType::AvatarMixer => 'W',
            NodeType::AssetServer => 'A',
            NodeType::MessagesMixer => 'm',
            NodeType::EntityScriptServer => 'S',
            NodeType::UpstreamAudioMixer => 'B',
            NodeType::UpstreamAvatarMixer => 'C',
            NodeType::DownstreamAudioMixer => 'a',
            NodeType::DownstreamAvatarMixer => 'w',
            NodeType::Unassigned => 1 as char,
        }
    }

    /// The wire code as a byte.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self.as_char() as u8
    }

    /// Parse a wire code; unknown codes map to [`NodeType::Unassigned`].
    #[must_use]
    pub fn from_u8(code: u8) -> Self {
        match code as char {
            'D' => NodeType::DomainServer,
            'o' => NodeType::EntityServer,
            'I' => NodeType::Agent,
            'M' => NodeType::AudioMixer,
            'W' => NodeType::AvatarMixer,
            'A' => NodeType::AssetServer,
            'm' => NodeType::MessagesMixer,
            'S' => NodeType::EntityScriptServer,
            'B' => NodeType::UpstreamAudioMixer,
            'C' => NodeType::UpstreamAvatarMixer,
            'a' => NodeType::DownstreamAudioMixer,
            'w' => NodeType::DownstreamAvatarMixer,
            _ => NodeType::Unassigned,
        }
    }

    /// Human-readable name for logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            NodeType::DomainServer => "Domain Server",
            NodeType::EntityServer => "Entity Server",
            NodeType::Agent => "Agent",
            NodeType::AudioMixer => "Audio Mixer",
            NodeType::AvatarMixer => "Avatar Mixer",
            NodeType::AssetServer => "Asset Server",
            NodeType::MessagesMixer => "Messages Mixer",
            NodeType::EntityScriptServer => "Entity Script Server",
            NodeType::UpstreamAudioMixer => "Upstream Audio Mixer",
            NodeType::UpstreamAvatarMixer => "Upstream Avatar Mixer",
            NodeType::DownstreamAudioMixer => "Downstream Audio Mixer",
            NodeType::DownstreamAvatarMixer => "Downstream Avatar Mixer",
            NodeType::Unassigned => "Unassigned",
        }
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
