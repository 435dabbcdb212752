//! Wire bodies of the domain negotiation packets.
//!
//! Builders for DomainConnectRequest and DomainListRequest, and the codec
//! for the DomainList response. Body fields are big-endian; strings are
//! length-prefixed UTF-16; addresses travel as an IP-version byte, four
//! address bytes and a port.
//!
//! The DomainListRequest body is the DomainConnectRequest identity block
//! without the credential fields, and a DomainList node record is
//! `type u8, uuid, public sockaddr, local sockaddr, permissions u32,
//! replicated u8, local id u16`; both layouts are gated by the respective
//! packet-type version bytes.

use crate::config::ClientConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use vircadia_codec::{wire, CodecError, WireReader};
use vircadia_packets::{
    protocol_version_signature, NodeType, PacketType, RawPacket, SessionPacket,
};

/// Why this client is (re)connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ConnectReason {
    /// Fresh connection
    Connect = 0,
    /// Reconnect after the domain went silent
    SilentDomainDisconnect = 1,
    /// Reconnect after system sleep
    Awake = 2,
}

/// Microseconds since the Unix epoch.
#[must_use]
pub fn unix_timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

const SOCKADDR_SIZE: usize = 7;

fn write_sockaddr(packet: &mut RawPacket, addr: SocketAddr) {
    let octets = match addr.ip() {
        IpAddr::V4(ip) => ip.octets(),
        IpAddr::V6(_) => {
            // The wire format carries IPv4 only; V6 degrades to unspecified
            tracing::warn!(%addr, "IPv6 address degraded to 0.0.0.0 on the wire");
            [0, 0, 0, 0]
        }
    };
    packet.write_u8(4);
    packet.write_bytes(&octets);
    packet.write_u16_be(addr.port());
}

fn read_sockaddr(r: &mut WireReader<'_>) -> Result<SocketAddr, CodecError> {
    let _version = r.read_u8()?;
    let bytes = r.read_bytes(4)?;
    let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = r.read_u16_be()?;
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Everything the check-in builders need beyond the static configuration.
#[derive(Debug, Clone, Copy)]
pub struct CheckinContext<'a> {
    /// The client configuration
    pub config: &'a ClientConfig,
    /// Why the client is connecting
    pub reason: ConnectReason,
    /// Public address to report
    pub public_address: SocketAddr,
    /// Local address to report
    pub local_address: SocketAddr,
    /// Current time in microseconds since the Unix epoch
    pub timestamp_us: u64,
}

fn identity_block_size(ctx: &CheckinContext<'_>) -> usize {
    let config = ctx.config;
    16                                                            // connect UUID
        + wire::blob_field_size(Some(&protocol_version_signature()))
        + wire::utf16_field_size(config.hardware_address.as_deref())
        + 16                                                      // fingerprint
        + wire::blob_field_size(config.system_info.as_deref())
        + 4                                                       // connect reason
        + 8 + 8                                                   // uptime, timestamp
        + 1                                                       // owner type
        + SOCKADDR_SIZE * 2
        + 4 + config.node_types_of_interest.len()
        + wire::utf16_field_size(Some(&config.place_name))
}

fn write_identity_block(packet: &mut RawPacket, ctx: &CheckinContext<'_>) {
    let config = ctx.config;
    // No ICE-discovery flow: the connect UUID is always nil
    packet.write_uuid(&Uuid::nil());
    packet.write_blob(Some(&protocol_version_signature()));
    packet.write_utf16_string(config.hardware_address.as_deref());
    packet.write_uuid(&config.machine_fingerprint);
    packet.write_blob(config.system_info.as_deref());
    packet.write_u32_be(ctx.reason as u32);
    packet.write_u64_be(config.previous_session_uptime);
    packet.write_u64_be(ctx.timestamp_us);
    packet.write_u8(config.owner_type.as_u8());
    write_sockaddr(packet, ctx.public_address);
    write_sockaddr(packet, ctx.local_address);
    packet.write_u32_be(config.node_types_of_interest.len() as u32);
    for node_type in &config.node_types_of_interest {
        packet.write_u8(node_type.as_u8());
    }
    packet.write_utf16_string(Some(&config.place_name));
}

/// Build a DomainConnectRequest (sent while not yet connected).
///
/// Carries the identity block plus the credential fields.
#[must_use]
pub fn build_domain_connect_request(ctx: &CheckinContext<'_>) -> SessionPacket {
    let config = ctx.config;
    let mut size = identity_block_size(ctx)
        + wire::utf16_field_size(config.username.as_deref())
        + wire::blob_field_size(config.username_signature.as_deref());
    let with_domain_credentials = config.domain_username.is_some();
    if with_domain_credentials {
        size += wire::utf16_field_size(config.domain_username.as_deref())
            + wire::utf16_field_size(config.domain_tokens.as_deref());
    }

    let mut packet = SessionPacket::create(PacketType::DomainConnectRequest, Some(size));
    write_identity_block(packet.raw_mut(), ctx);
    packet.raw_mut().write_utf16_string(config.username.as_deref());
    packet
        .raw_mut()
        .write_blob(config.username_signature.as_deref());
    if with_domain_credentials {
        packet
            .raw_mut()
            .write_utf16_string(config.domain_username.as_deref());
        packet
            .raw_mut()
            .write_utf16_string(config.domain_tokens.as_deref());
    }
    packet
}

/// Build a DomainListRequest (the keep-alive sent while connected).
///
/// The identity block alone; no credentials.
#[must_use]
pub fn build_domain_list_request(ctx: &CheckinContext<'_>) -> SessionPacket {
    let mut packet =
        SessionPacket::create(PacketType::DomainListRequest, Some(identity_block_size(ctx)));
    write_identity_block(packet.raw_mut(), ctx);
    packet
}

/// One node record in a DomainList response.
///
/// The same record layout is the whole body of DomainServerAddedNode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainListNode {
    /// The node's type
    pub node_type: NodeType,
    /// The node's UUID
    pub uuid: Uuid,
    /// Public address
    pub public_address: SocketAddr,
    /// Local-network address
    pub local_address: SocketAddr,
    /// Permissions granted to this client at the node
    pub permissions: u32,
    /// Whether the node replicates another
    pub is_replicated: bool,
    /// The node's 16-bit local ID
    pub local_id: u16,
}

impl DomainListNode {
    /// Wire size of one record.
    pub const RECORD_SIZE: usize = 1 + 16 + SOCKADDR_SIZE * 2 + 4 + 1 + 2;

    /// Decode one record.
    pub fn read(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let node_type = NodeType::from_u8(r.read_u8()?);
        let uuid = r.read_uuid()?;
        let public_address = read_sockaddr(r)?;
        let local_address = read_sockaddr(r)?;
        let permissions = r.read_u32_be()?;
        let is_replicated = r.read_u8()? != 0;
        let local_id = r.read_u16_be()?;
        Ok(Self {
            node_type,
            uuid,
            public_address,
            local_address,
            permissions,
            is_replicated,
            local_id,
        })
    }

    /// Encode one record at the packet cursor.
    pub fn write(&self, packet: &mut RawPacket) {
        packet.write_u8(self.node_type.as_u8());
        packet.write_uuid(&self.uuid);
        write_sockaddr(packet, self.public_address);
        write_sockaddr(packet, self.local_address);
        packet.write_u32_be(self.permissions);
        packet.write_u8(u8::from(self.is_replicated));
        packet.write_u16_be(self.local_id);
    }
}

/// A decoded DomainList response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainList {
    /// The domain server's UUID
    pub domain_uuid: Uuid,
    /// The domain server's local ID
    pub domain_local_id: u16,
    /// The session UUID assigned to this client
    pub session_uuid: Uuid,
    /// The local ID assigned to this client
    pub local_id: u16,
    /// Permissions granted by the domain
    pub permissions: u32,
    /// Whether the domain authenticated the client
    pub is_authenticated: bool,
    /// Echo of the connect request timestamp
    pub connect_request_timestamp_us: u64,
    /// Server time the response was sent
    pub ping_send_time_us: u64,
    /// Server-side check-in processing time
    pub checkin_processing_time_us: u64,
    /// Whether the domain considers this a new connection
    pub new_connection: bool,
    /// Advertised service nodes, one per type
    pub nodes: Vec<DomainListNode>,
}

impl DomainList {
    /// Decode a DomainList payload.
    pub fn parse(payload: &[u8]) -> Result<Self, CodecError> {
        let mut r = WireReader::new(payload);
        let domain_uuid = r.read_uuid()?;
        let domain_local_id = r.read_u16_be()?;
        let session_uuid = r.read_uuid()?;
        let local_id = r.read_u16_be()?;
        let permissions = r.read_u32_be()?;
        let is_authenticated = r.read_u8()? != 0;
        let connect_request_timestamp_us = r.read_u64_be()?;
        let ping_send_time_us = r.read_u64_be()?;
        let checkin_processing_time_us = r.read_u64_be()?;
        let new_connection = r.read_u8()? != 0;

        let mut nodes = Vec::new();
        while r.remaining() > 0 {
            nodes.push(DomainListNode::read(&mut r)?);
        }

        Ok(Self {
            domain_uuid,
            domain_local_id,
            session_uuid,
            local_id,
            permissions,
            is_authenticated,
            connect_request_timestamp_us,
            ping_send_time_us,
            checkin_processing_time_us,
            new_connection,
            nodes,
        })
    }

    /// Encode this DomainList as a payload.
    ///
    /// The client never sends one; the encoder exists for the scripted
    /// domain server used in tests and tooling.
    #[must_use]
    pub fn encode_payload(&self) -> Vec<u8> {
        const FIXED: usize = 16 + 2 + 16 + 2 + 4 + 1 + 8 + 8 + 8 + 1;
        let mut packet =
            RawPacket::for_send(FIXED + DomainListNode::RECORD_SIZE * self.nodes.len());

        packet.write_uuid(&self.domain_uuid);
        packet.write_u16_be(self.domain_local_id);
        packet.write_uuid(&self.session_uuid);
        packet.write_u16_be(self.local_id);
        packet.write_u32_be(self.permissions);
        packet.write_u8(u8::from(self.is_authenticated));
        packet.write_u64_be(self.connect_request_timestamp_us);
        packet.write_u64_be(self.ping_send_time_us);
        packet.write_u64_be(self.checkin_processing_time_us);
        packet.write_u8(u8::from(self.new_connection));
        for node in &self.nodes {
            node.write(&mut packet);
        }
        packet.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(config: &'a ClientConfig) -> CheckinContext<'a> {
        CheckinContext {
            config,
            reason: ConnectReason::Connect,
            public_address: "203.0.113.1:7000".parse().unwrap(),
            local_address: "192.168.0.10:7000".parse().unwrap(),
            timestamp_us: 1_700_000_000_000_000,
        }
    }

    #[test]
    fn test_connect_request_fills_declared_capacity() {
        let mut config = ClientConfig::new();
        config.place_name = "sandbox".into();
        config.username = Some("ada".into());
        config.username_signature = Some(vec![1, 2, 3]);
        let packet = build_domain_connect_request(&context(&config));

        // Every declared byte was written: the cursor sits at the end
        assert_eq!(packet.transport().raw().remaining(), 0);
        assert_eq!(packet.packet_type(), PacketType::DomainConnectRequest);
    }

    #[test]
    fn test_connect_request_body_reads_back() {
        let mut config = ClientConfig::new();
        config.place_name = "plaza".into();
        config.hardware_address = Some("aa:bb:cc".into());
        let ctx = context(&config);
        let packet = build_domain_connect_request(&ctx);

        let mut r = WireReader::new(packet.payload());
        assert_eq!(r.read_uuid().unwrap(), Uuid::nil());
        assert_eq!(
            r.read_blob().unwrap().as_deref(),
            Some(&protocol_version_signature()[..])
        );
        assert_eq!(r.read_utf16_string().unwrap().as_deref(), Some("aa:bb:cc"));
        assert_eq!(r.read_uuid().unwrap(), config.machine_fingerprint);
        assert_eq!(r.read_blob().unwrap(), None);
        assert_eq!(r.read_u32_be().unwrap(), ConnectReason::Connect as u32);
        assert_eq!(r.read_u64_be().unwrap(), 0);
        assert_eq!(r.read_u64_be().unwrap(), ctx.timestamp_us);
        assert_eq!(r.read_u8().unwrap(), NodeType::Agent.as_u8());
        assert_eq!(read_sockaddr(&mut r).unwrap(), ctx.public_address);
        assert_eq!(read_sockaddr(&mut r).unwrap(), ctx.local_address);
        let count = r.read_u32_be().unwrap() as usize;
        assert_eq!(count, config.node_types_of_interest.len());
        for expected in &config.node_types_of_interest {
            assert_eq!(r.read_u8().unwrap(), expected.as_u8());
        }
        assert_eq!(r.read_utf16_string().unwrap().as_deref(), Some("plaza"));
        // Credential block: null username, null signature
        assert_eq!(r.read_utf16_string().unwrap(), None);
        assert_eq!(r.read_blob().unwrap(), None);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_list_request_has_no_credentials() {
        let mut config = ClientConfig::new();
        config.username = Some("ada".into());
        let ctx = context(&config);

        let connect = build_domain_connect_request(&ctx);
        let keep_alive = build_domain_list_request(&ctx);
        assert_eq!(keep_alive.packet_type(), PacketType::DomainListRequest);
        assert!(keep_alive.payload().len() < connect.payload().len());
        assert_eq!(keep_alive.transport().raw().remaining(), 0);
    }

    #[test]
    fn test_domain_credentials_written_together() {
        let mut config = ClientConfig::new();
        config.domain_username = Some("resident".into());
        config.domain_tokens = Some("tok-1".into());
        let packet = build_domain_connect_request(&context(&config));
        assert_eq!(packet.transport().raw().remaining(), 0);
    }

    #[test]
    fn test_domain_list_roundtrip() {
        let list = DomainList {
            domain_uuid: Uuid::new_v4(),
            domain_local_id: 11,
            session_uuid: Uuid::new_v4(),
            local_id: 888,
            permissions: 0x0000_03FF,
            is_authenticated: true,
            connect_request_timestamp_us: 1,
            ping_send_time_us: 2,
            checkin_processing_time_us: 3,
            new_connection: true,
            nodes: vec![
                DomainListNode {
                    node_type: NodeType::AudioMixer,
                    uuid: Uuid::new_v4(),
                    public_address: "203.0.113.9:6000".parse().unwrap(),
                    local_address: "10.1.1.9:6000".parse().unwrap(),
                    permissions: 1,
                    is_replicated: false,
                    local_id: 501,
                },
                DomainListNode {
                    node_type: NodeType::AvatarMixer,
                    uuid: Uuid::new_v4(),
                    public_address: "203.0.113.9:6001".parse().unwrap(),
                    local_address: "10.1.1.9:6001".parse().unwrap(),
                    permissions: 2,
                    is_replicated: true,
                    local_id: 502,
                },
            ],
        };

        let decoded = DomainList::parse(&list.encode_payload()).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn test_truncated_domain_list_is_an_error() {
        let list = DomainList {
            domain_uuid: Uuid::new_v4(),
            domain_local_id: 0,
            session_uuid: Uuid::new_v4(),
            local_id: 1,
            permissions: 0,
            is_authenticated: false,
            connect_request_timestamp_us: 0,
            ping_send_time_us: 0,
            checkin_processing_time_us: 0,
            new_connection: false,
            nodes: vec![],
        };
        let payload = list.encode_payload();
        assert!(DomainList::parse(&payload[..payload.len() - 3]).is_err());
    }

    #[test]
    fn test_sockaddr_roundtrip() {
        let mut packet = RawPacket::for_send(SOCKADDR_SIZE);
        let addr: SocketAddr = "198.51.100.20:40102".parse().unwrap();
        write_sockaddr(&mut packet, addr);
        let mut r = WireReader::new(packet.as_bytes());
        assert_eq!(read_sockaddr(&mut r).unwrap(), addr);
    }
}
