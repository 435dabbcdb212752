//! The node registry and check-in driver.
//!
//! [`NodeList`] owns the domain handler, the multiplexed socket and the
//! packet receiver. It runs the once-per-second check-in against the
//! domain, pumps inbound datagrams up through the framing layers into the
//! dispatcher, and maintains the directory of known service nodes with
//! their liveness signals.
//!
//! Check-in sequence, idempotent per tick: no URL - do nothing; signaling
//! pending - wait; domain data channel pending - wait; both open - send
//! DomainConnectRequest (not yet connected) or DomainListRequest
//! (keep-alive). A DomainList response drives the connected transition and
//! refreshes the directory. Too many unanswered check-ins count as a
//! domain timeout.

use crate::config::ClientConfig;
use crate::domain_handler::DomainHandler;
use crate::node::Node;
use crate::protocol::{
    build_domain_connect_request, build_domain_list_request, unix_timestamp_us, CheckinContext,
    ConnectReason, DomainList,
};
use crate::receiver::{Listener, PacketReceiver};
use crate::signal::Signal;
use crate::{CHECKIN_INTERVAL, MAX_SILENT_CHECKINS};
use dashmap::DashMap;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use vircadia_codec::SequenceNumber;
use vircadia_packets::{
    ControlPacket, ControlPacketType, NodeType, PacketType, RawPacket, ReceivedMessage,
    SessionPacket, TransportHeader,
};
use vircadia_transport::{
    ConnectionState, PeerFactory, ReceivedDatagram, SignalingConnector, WebrtcSocket,
};

/// Registry of service nodes and driver of the domain session.
pub struct NodeList {
    config: Arc<ClientConfig>,
    socket: Arc<WebrtcSocket>,
    receiver: Arc<PacketReceiver>,
    domain: Arc<DomainHandler>,
    nodes: DashMap<NodeType, Arc<Node>>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<ReceivedDatagram>>>,
    send_sequence: Mutex<SequenceNumber>,
    unanswered_checkins: AtomicU32,
    connect_reason: Mutex<ConnectReason>,
    self_weak: Weak<Self>,
    node_added: Signal<Arc<Node>>,
    node_activated: Signal<Arc<Node>>,
    node_socket_updated: Signal<Arc<Node>>,
    node_killed: Signal<Arc<Node>>,
}

impl NodeList {
    /// Build a node list over the given transport primitives.
    #[must_use]
    pub fn new(
        config: Arc<ClientConfig>,
        connector: Arc<dyn SignalingConnector>,
        factory: Arc<dyn PeerFactory>,
    ) -> Arc<Self> {
        let (socket, inbound_rx) = WebrtcSocket::new(connector, factory);
        let list = Arc::new_cyclic(|weak| Self {
            config,
            socket,
            receiver: Arc::new(PacketReceiver::new()),
            domain: Arc::new(DomainHandler::new()),
            nodes: DashMap::new(),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            // Random initial sequence number, as on any fresh UDT-style
            // conversation
            send_sequence: Mutex::new(SequenceNumber::new(rand::random())),
            unanswered_checkins: AtomicU32::new(0),
            connect_reason: Mutex::new(ConnectReason::Connect),
            self_weak: weak.clone(),
            node_added: Signal::new(),
            node_activated: Signal::new(),
            node_socket_updated: Signal::new(),
            node_killed: Signal::new(),
        });
        list.register_core_listeners();
        list
    }

    /// Spawn the inbound pump and the check-in timer.
    ///
    /// Both tasks hold only weak references; dropping the last `Arc` stops
    /// them.
    pub fn start(self: &Arc<Self>) {
        let inbound = self
            .inbound_rx
            .lock()
            .expect("inbound lock")
            .take();
        if let Some(mut inbound) = inbound {
            let weak = Arc::downgrade(self);
            tokio::spawn(async move {
                while let Some(datagram) = inbound.recv().await {
                    let Some(list) = weak.upgrade() else { break };
                    list.process_datagram(datagram);
                }
            });
        } else {
            tracing::warn!("node list started twice; pump already running");
        }

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CHECKIN_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(list) = weak.upgrade() else { break };
                list.send_domain_server_check_in();
            }
        });
    }

    /// The domain handler.
    #[must_use]
    pub fn domain_handler(&self) -> &Arc<DomainHandler> {
        &self.domain
    }

    /// The packet receiver consumers register with.
    #[must_use]
    pub fn packet_receiver(&self) -> &Arc<PacketReceiver> {
        &self.receiver
    }

    /// The known node of `node_type`; node types are solo per domain.
    #[must_use]
    pub fn solo_node_of_type(&self, node_type: NodeType) -> Option<Arc<Node>> {
        self.nodes.get(&node_type).map(|n| Arc::clone(&n))
    }

    /// Signal: a node was added to the directory.
    #[must_use]
    pub fn node_added_signal(&self) -> &Signal<Arc<Node>> {
        &self.node_added
    }

    /// Signal: a node's data channel opened.
    #[must_use]
    pub fn node_activated_signal(&self) -> &Signal<Arc<Node>> {
        &self.node_activated
    }

    /// Signal: a node's transport address changed.
    #[must_use]
    pub fn node_socket_updated_signal(&self) -> &Signal<Arc<Node>> {
        &self.node_socket_updated
    }

    /// Signal: a node left the directory.
    #[must_use]
    pub fn node_killed_signal(&self) -> &Signal<Arc<Node>> {
        &self.node_killed
    }

    /// Send a sourced or unsourced packet to a known node.
    ///
    /// Stamps the per-node sequence number and, for sourced types, our
    /// assigned local ID.
    pub fn send_packet(&self, packet: &mut SessionPacket, node: &Node) -> bool {
        let Some(address) = node.active_address() else {
            tracing::error!(node_type = %node.node_type(), "send to inactive node");
            return false;
        };
        packet.write_sequence_number(node.next_sequence_number());
        if packet.packet_type().is_sourced() {
            packet.write_source_id(self.domain.local_id());
        }
        self.socket.send_to_address(address, packet.as_bytes())
    }

    /// Send a packet straight to a channel address, bypassing the node
    /// directory.
    pub fn send_unreliable_packet(&self, packet: &mut SessionPacket, address: SocketAddr) -> bool {
        packet.write_sequence_number(self.next_send_sequence());
        if packet.packet_type().is_sourced() {
            packet.write_source_id(self.domain.local_id());
        }
        self.socket.send_to_address(address, packet.as_bytes())
    }

    /// One tick of the check-in protocol. Safe to call with nothing in
    /// flight.
    pub fn send_domain_server_check_in(&self) {
        let Some(url) = self.domain.url() else {
            return;
        };

        if self.domain.is_connected()
            && self.unanswered_checkins.load(Ordering::SeqCst) > MAX_SILENT_CHECKINS
        {
            tracing::warn!(url, "domain stopped answering check-ins");
            self.unanswered_checkins.store(0, Ordering::SeqCst);
            *self.connect_reason.lock().expect("reason lock") =
                ConnectReason::SilentDomainDisconnect;
            self.domain.set_disconnected("check-in timeout");
            self.kill_all_nodes();
            return;
        }

        match self.socket.signaling_state(&url) {
            ConnectionState::Unconnected => {
                self.socket.ensure_signaling(&url);
                return;
            }
            ConnectionState::Connecting => return,
            ConnectionState::Connected => {}
        }

        match self.socket.state(&url, NodeType::DomainServer) {
            ConnectionState::Unconnected => {
                let domain = Arc::clone(&self.domain);
                self.socket
                    .connect_to_host(&url, NodeType::DomainServer, move |id| {
                        domain.set_ready_port(id);
                    });
                return;
            }
            ConnectionState::Connecting => return,
            ConnectionState::Connected => {}
        }

        self.unanswered_checkins.fetch_add(1, Ordering::SeqCst);

        let port = self.domain.ready_port().unwrap_or(0);
        let local_address = SocketAddr::from(([0, 0, 0, 0], port));
        let ctx = CheckinContext {
            config: &self.config,
            reason: *self.connect_reason.lock().expect("reason lock"),
            public_address: local_address,
            local_address,
            timestamp_us: unix_timestamp_us(),
        };

        let mut packet = if self.domain.is_connected() {
            build_domain_list_request(&ctx)
        } else {
            self.domain.set_connecting();
            build_domain_connect_request(&ctx)
        };
        packet.write_sequence_number(self.next_send_sequence());

        if !self
            .socket
            .send_to(&url, NodeType::DomainServer, packet.as_bytes())
        {
            tracing::warn!(url, "check-in send failed");
        }
    }

    /// Drop the domain connection and every node.
    pub async fn reset(&self) {
        self.domain.set_disconnected("reset");
        self.kill_all_nodes();
        self.socket.clear_connections().await;
    }

    fn next_send_sequence(&self) -> SequenceNumber {
        let mut seq = self.send_sequence.lock().expect("sequence lock");
        *seq = seq.next();
        *seq
    }

    fn register_core_listeners(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.receiver.register_listener(
            PacketType::DomainList,
            Listener::unsourced(move |message| {
                if let Some(list) = weak.upgrade() {
                    list.process_domain_list(&message);
                }
            }),
        );

        let weak = Arc::downgrade(self);
        self.receiver.register_listener(
            PacketType::DomainServerAddedNode,
            Listener::unsourced(move |message| {
                if let Some(list) = weak.upgrade() {
                    list.process_added_node(&message);
                }
            }),
        );

        let weak = Arc::downgrade(self);
        self.receiver.register_listener(
            PacketType::DomainServerRemovedNode,
            Listener::unsourced(move |message| {
                if let Some(list) = weak.upgrade() {
                    list.process_removed_node(&message);
                }
            }),
        );

        self.receiver.register_listener(
            PacketType::DomainConnectionDenied,
            Listener::unsourced(|message| {
                tracing::warn!(bytes = message.data().len(), "domain connection denied");
            }),
        );

        let weak = Arc::downgrade(self);
        self.receiver.register_listener(
            PacketType::Ping,
            Listener::sourced(move |message, node| {
                if let (Some(list), Some(node)) = (weak.upgrade(), node) {
                    list.reply_to_ping(&message, &node);
                }
            }),
        );
    }

    fn process_datagram(&self, datagram: ReceivedDatagram) {
        let raw = RawPacket::from_received(datagram.data, datagram.sender);
        match TransportHeader::peek_is_control(raw.as_bytes()) {
            Ok(true) => match ControlPacket::decode(raw.as_bytes()) {
                Ok(control) => self.handle_control_packet(control, raw.sender()),
                Err(e) => {
                    tracing::error!(error = %e, "undecodable control packet dropped");
                }
            },
            Ok(false) => match SessionPacket::from_raw(raw) {
                Ok(packet) => {
                    let source_node = packet
                        .source_id()
                        .and_then(|id| self.node_by_local_id(id));
                    self.receiver.handle_verified_packet(&packet, source_node);
                }
                Err(e) => {
                    tracing::error!(error = %e, "undecodable packet dropped");
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "runt datagram dropped");
            }
        }
    }

    fn handle_control_packet(&self, control: ControlPacket, sender: SocketAddr) {
        tracing::debug!(?control, %sender, "control packet received");
        match control.control_type {
            ControlPacketType::HandshakeRequest => {
                // Answer with our current send sequence; the rest of the
                // reliable-delivery vocabulary stays dormant until a
                // reliability layer exists to drive it
                let current = *self.send_sequence.lock().expect("sequence lock");
                let reply = ControlPacket::handshake(current).encode();
                self.socket.send_to_address(sender, reply.as_bytes());
            }
            ControlPacketType::Handshake
            | ControlPacketType::HandshakeAck
            | ControlPacketType::Ack => {
                tracing::trace!(control_type = ?control.control_type, "control packet noted");
            }
        }
    }

    fn node_by_local_id(&self, local_id: u16) -> Option<Arc<Node>> {
        self.nodes
            .iter()
            .find(|entry| entry.value().local_id() == local_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn process_domain_list(&self, message: &ReceivedMessage) {
        let list = match DomainList::parse(&message.data()) {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(error = %e, "malformed DomainList dropped");
                return;
            }
        };

        if self.domain.is_connected() && self.domain.domain_uuid() != list.domain_uuid {
            // Identity mismatch: ignored without tearing anything down
            tracing::trace!(domain = %list.domain_uuid, "DomainList from unexpected domain");
            return;
        }

        self.unanswered_checkins.store(0, Ordering::SeqCst);
        *self.connect_reason.lock().expect("reason lock") = ConnectReason::Connect;

        self.domain.set_connected(
            list.domain_uuid,
            list.domain_local_id,
            list.session_uuid,
            list.local_id,
            list.permissions,
        );
        self.update_directory(&list);
    }

    fn update_directory(&self, list: &DomainList) {
        let Some(url) = self.domain.url() else { return };

        let mut advertised = HashSet::new();
        for record in &list.nodes {
            advertised.insert(record.node_type);
            let existing = self.solo_node_of_type(record.node_type);
            match existing {
                Some(node) if node.uuid() == record.uuid => {}
                Some(stale) => {
                    tracing::debug!(node_type = %stale.node_type(), "node replaced by domain");
                    self.kill_node(&stale);
                    self.add_node(&url, record);
                }
                None => self.add_node(&url, record),
            }
        }

        let vanished: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|entry| !advertised.contains(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for node in vanished {
            self.kill_node(&node);
        }
    }

    fn add_node(&self, url: &str, record: &crate::protocol::DomainListNode) {
        let node = Arc::new(Node::new(
            record.node_type,
            record.uuid,
            record.local_id,
            record.permissions,
            record.is_replicated,
            record.public_address,
            record.local_address,
        ));
        self.nodes.insert(record.node_type, Arc::clone(&node));
        tracing::info!(node_type = %record.node_type, uuid = %record.uuid, "node added");
        self.node_added.emit(Arc::clone(&node));

        // Open the node's channel; the node activates when it opens
        let weak_node = Arc::downgrade(&node);
        let weak_list = self.self_weak.clone();
        self.socket
            .connect_to_host(url, record.node_type, move |id| {
                let (Some(node), Some(list)) = (weak_node.upgrade(), weak_list.upgrade()) else {
                    return;
                };
                node.activate(SocketAddr::from(([0, 0, 0, 0], id)));
                tracing::info!(node_type = %node.node_type(), "node activated");
                list.node_activated.emit(Arc::clone(&node));
                list.node_socket_updated.emit(node);
            });
    }

    fn kill_node(&self, node: &Arc<Node>) {
        self.nodes.remove(&node.node_type());
        node.deactivate();
        tracing::info!(node_type = %node.node_type(), "node killed");
        self.node_killed.emit(Arc::clone(node));

        if let Some(url) = self.domain.url() {
            if let Some(channel) = self.socket.channel(&url, node.node_type()) {
                tokio::spawn(async move { channel.close().await });
            }
        }
    }

    fn kill_all_nodes(&self) {
        let all: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for node in all {
            self.kill_node(&node);
        }
    }

    fn process_added_node(&self, message: &ReceivedMessage) {
        let data = message.data();
        let mut reader = vircadia_codec::WireReader::new(&data);
        let record = match crate::protocol::DomainListNode::read(&mut reader) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "malformed DomainServerAddedNode dropped");
                return;
            }
        };
        let Some(url) = self.domain.url() else { return };
        if self.solo_node_of_type(record.node_type).is_none() {
            self.add_node(&url, &record);
        }
    }

    fn process_removed_node(&self, message: &ReceivedMessage) {
        let data = message.data();
        let mut reader = vircadia_codec::WireReader::new(&data);
        let uuid = match reader.read_uuid() {
            Ok(uuid) => uuid,
            Err(e) => {
                tracing::error!(error = %e, "malformed DomainServerRemovedNode dropped");
                return;
            }
        };
        let found = self
            .nodes
            .iter()
            .find(|entry| entry.value().uuid() == uuid)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(node) = found {
            self.kill_node(&node);
        }
    }

    fn reply_to_ping(&self, message: &ReceivedMessage, node: &Arc<Node>) {
        let data = message.data();
        let mut reader = vircadia_codec::WireReader::new(&data);
        let (ping_type, ping_time) = match (reader.read_u8(), reader.read_u64_be()) {
            (Ok(t), Ok(ts)) => (t, ts),
            _ => {
                tracing::debug!("malformed ping dropped");
                return;
            }
        };

        let mut reply = SessionPacket::create(PacketType::PingReply, Some(1 + 8 + 8));
        reply.raw_mut().write_u8(ping_type);
        reply.raw_mut().write_u64_be(ping_time);
        reply.raw_mut().write_u64_be(unix_timestamp_us());
        self.send_packet(&mut reply, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DomainListNode;
    use std::time::Duration;
    use uuid::Uuid;
    use vircadia_transport::memory::{LoopbackPeerFactory, MemorySignalingServer};

    const URL: &str = "wss://domain.example";

    fn mixer_record(node_type: NodeType, local_id: u16) -> DomainListNode {
        DomainListNode {
            node_type,
            uuid: Uuid::new_v4(),
            public_address: "203.0.113.2:5000".parse().unwrap(),
            local_address: "10.0.0.2:5000".parse().unwrap(),
            permissions: 1,
            is_replicated: false,
            local_id,
        }
    }

    fn domain_list_reply(
        domain_uuid: Uuid,
        session_uuid: Uuid,
        nodes: Vec<DomainListNode>,
    ) -> Vec<u8> {
        let list = DomainList {
            domain_uuid,
            domain_local_id: 1,
            session_uuid,
            local_id: 4242,
            permissions: 3,
            is_authenticated: false,
            connect_request_timestamp_us: 0,
            ping_send_time_us: 0,
            checkin_processing_time_us: 0,
            new_connection: true,
            nodes,
        };
        let payload = list.encode_payload();
        let mut packet = SessionPacket::create(PacketType::DomainList, Some(payload.len()));
        packet.raw_mut().write_bytes(&payload);
        packet.as_bytes().to_vec()
    }

    /// A scripted domain: answers every check-in it is willing to (per
    /// `max_answers`) with a DomainList advertising `nodes`.
    fn rig(
        nodes: Arc<Mutex<Vec<DomainListNode>>>,
        max_answers: u32,
    ) -> (Arc<NodeList>, Uuid) {
        let server = Arc::new(MemorySignalingServer::new());
        Arc::clone(&server).spawn_auto_answer();
        let factory = Arc::new(LoopbackPeerFactory::new());

        let domain_uuid = Uuid::new_v4();
        let session_uuid = Uuid::new_v4();
        let answers = AtomicU32::new(0);
        factory.set_message_handler(move |bytes, remote| {
            let raw = RawPacket::from_received(bytes.to_vec(), "0.0.0.0:1".parse().unwrap());
            let Ok(packet) = SessionPacket::from_raw(raw) else {
                return;
            };
            match packet.packet_type() {
                PacketType::DomainConnectRequest | PacketType::DomainListRequest => {
                    if answers.fetch_add(1, Ordering::SeqCst) >= max_answers {
                        return;
                    }
                    let advertised = nodes.lock().expect("nodes lock").clone();
                    remote.deliver(domain_list_reply(domain_uuid, session_uuid, advertised));
                }
                _ => {}
            }
        });

        let list = NodeList::new(Arc::new(ClientConfig::new()), server.connector(), factory);
        list.start();
        (list, domain_uuid)
    }

    async fn expect<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .expect("timed out waiting for signal")
            .expect("signal closed")
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_in_reaches_connected() {
        let nodes = Arc::new(Mutex::new(vec![mixer_record(NodeType::AudioMixer, 501)]));
        let (list, domain_uuid) = rig(nodes, u32::MAX);

        let mut connected = list.domain_handler().connected_signal().connect();
        let mut added = list.node_added_signal().connect();
        let mut activated = list.node_activated_signal().connect();
        list.domain_handler().set_url(URL);

        assert_eq!(expect(&mut connected).await, URL);
        assert!(list.domain_handler().is_connected());
        assert_eq!(list.domain_handler().domain_uuid(), domain_uuid);
        assert_eq!(list.domain_handler().local_id(), 4242);
        assert!(list.domain_handler().ready_port().is_some());

        let node = expect(&mut added).await;
        assert_eq!(node.node_type(), NodeType::AudioMixer);
        let node = expect(&mut activated).await;
        assert!(node.is_active());
        assert!(list.solo_node_of_type(NodeType::AudioMixer).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_domain_list_does_not_refire() {
        let nodes = Arc::new(Mutex::new(Vec::new()));
        let (list, _domain_uuid) = rig(nodes, u32::MAX);

        let mut connected = list.domain_handler().connected_signal().connect();
        list.domain_handler().set_url(URL);
        assert_eq!(expect(&mut connected).await, URL);

        // Several keep-alive cycles pass; the signal stays quiet
        let refire = tokio::time::timeout(Duration::from_secs(10), connected.recv()).await;
        assert!(refire.is_err(), "connected signal fired twice");
        assert!(list.domain_handler().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_domain_times_out() {
        let nodes = Arc::new(Mutex::new(vec![mixer_record(NodeType::AudioMixer, 501)]));
        // One answer, then silence
        let (list, _domain_uuid) = rig(nodes, 1);

        let mut connected = list.domain_handler().connected_signal().connect();
        let mut disconnected = list.domain_handler().disconnected_signal().connect();
        let mut killed = list.node_killed_signal().connect();
        list.domain_handler().set_url(URL);

        assert_eq!(expect(&mut connected).await, URL);
        expect(&mut disconnected).await;
        assert!(!list.domain_handler().is_connected());

        let node = expect(&mut killed).await;
        assert_eq!(node.node_type(), NodeType::AudioMixer);
        assert!(list.solo_node_of_type(NodeType::AudioMixer).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_node_is_killed() {
        let nodes = Arc::new(Mutex::new(vec![mixer_record(NodeType::AudioMixer, 501)]));
        let (list, _domain_uuid) = rig(Arc::clone(&nodes), u32::MAX);

        let mut activated = list.node_activated_signal().connect();
        let mut killed = list.node_killed_signal().connect();
        list.domain_handler().set_url(URL);
        expect(&mut activated).await;

        // The domain stops advertising the mixer
        nodes.lock().expect("nodes lock").clear();
        let node = expect(&mut killed).await;
        assert_eq!(node.node_type(), NodeType::AudioMixer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_in_without_url_is_a_no_op() {
        let nodes = Arc::new(Mutex::new(Vec::new()));
        let (list, _domain_uuid) = rig(nodes, u32::MAX);
        // No URL set; ticks pass without effect
        tokio::time::sleep(Duration::from_secs(5)).await;
        list.send_domain_server_check_in();
        assert!(!list.domain_handler().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_packet_to_inactive_node_fails() {
        let nodes = Arc::new(Mutex::new(Vec::new()));
        let (list, _domain_uuid) = rig(nodes, u32::MAX);

        let node = Node::new(
            NodeType::AudioMixer,
            Uuid::new_v4(),
            9,
            0,
            false,
            "0.0.0.0:1".parse().unwrap(),
            "0.0.0.0:1".parse().unwrap(),
        );
        let mut packet = SessionPacket::create(PacketType::Ping, Some(9));
        packet.raw_mut().write_u8(0);
        packet.raw_mut().write_u64_be(1);
        assert!(!list.send_packet(&mut packet, &node));
    }
}
