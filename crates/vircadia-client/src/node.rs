//! Remote service nodes.
//!
//! A [`Node`] is one service endpoint advertised by the domain: its type,
//! identity, permissions, and - once its data channel opens - the active
//! transport address. A node without an active address is known but not
//! reachable. Node types are solo per domain connection in this protocol:
//! at most one node of each type.

use std::net::SocketAddr;
use std::sync::Mutex;
use uuid::Uuid;
use vircadia_codec::SequenceNumber;
use vircadia_packets::NodeType;

/// One remote service endpoint.
#[derive(Debug)]
pub struct Node {
    node_type: NodeType,
    uuid: Uuid,
    local_id: u16,
    permissions: u32,
    is_replicated: bool,
    public_address: SocketAddr,
    local_address: SocketAddr,
    active_address: Mutex<Option<SocketAddr>>,
    send_sequence: Mutex<SequenceNumber>,
}

impl Node {
    /// Create a node from a domain list record.
    #[must_use]
    pub fn new(
        node_type: NodeType,
        uuid: Uuid,
        local_id: u16,
        permissions: u32,
        is_replicated: bool,
        public_address: SocketAddr,
        local_address: SocketAddr,
    ) -> Self {
        Self {
            node_type,
            uuid,
            local_id,
            permissions,
            is_replicated,
            public_address,
            local_address,
            active_address: Mutex::new(None),
            send_sequence: Mutex::new(SequenceNumber::new(0)),
        }
    }

    /// The node's type.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// The node's UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The node's 16-bit local ID.
    #[must_use]
    pub fn local_id(&self) -> u16 {
        self.local_id
    }

    /// Permissions granted to this client at this node.
    #[must_use]
    pub fn permissions(&self) -> u32 {
        self.permissions
    }

    /// Whether this node replicates another.
    #[must_use]
    pub fn is_replicated(&self) -> bool {
        self.is_replicated
    }

    /// The public address advertised by the domain.
    #[must_use]
    pub fn public_address(&self) -> SocketAddr {
        self.public_address
    }

    /// The local-network address advertised by the domain.
    #[must_use]
    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    /// The active transport address; `None` while unreachable.
    #[must_use]
    pub fn active_address(&self) -> Option<SocketAddr> {
        *self.active_address.lock().expect("active address lock")
    }

    /// True once the node's data channel is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_address().is_some()
    }

    /// Record the open data channel's address.
    pub fn activate(&self, address: SocketAddr) {
        *self.active_address.lock().expect("active address lock") = Some(address);
    }

    /// Drop the transport address, keeping the node known.
    pub fn deactivate(&self) {
        *self.active_address.lock().expect("active address lock") = None;
    }

    /// The sequence number for the next packet to this node.
    #[must_use]
    pub fn next_sequence_number(&self) -> SequenceNumber {
        let mut seq = self.send_sequence.lock().expect("sequence lock");
        *seq = seq.next();
        *seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node() -> Node {
        Node::new(
            NodeType::AudioMixer,
            Uuid::new_v4(),
            301,
            0xFF,
            false,
            "203.0.113.5:4000".parse().unwrap(),
            "192.168.1.5:4000".parse().unwrap(),
        )
    }

    #[test]
    fn test_new_node_is_inactive() {
        let node = test_node();
        assert!(!node.is_active());
        assert_eq!(node.active_address(), None);
    }

    #[test]
    fn test_activation_roundtrip() {
        let node = test_node();
        let addr: SocketAddr = "0.0.0.0:3".parse().unwrap();
        node.activate(addr);
        assert!(node.is_active());
        assert_eq!(node.active_address(), Some(addr));

        node.deactivate();
        assert!(!node.is_active());
    }

    #[test]
    fn test_sequence_numbers_advance() {
        let node = test_node();
        let a = node.next_sequence_number();
        let b = node.next_sequence_number();
        assert!(a.is_before(b));
    }
}
