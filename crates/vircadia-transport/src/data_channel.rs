//! Per-(domain, node type) WebRTC data channels.
//!
//! A [`WebrtcDataChannel`] wraps one peer connection plus its single
//! unreliable, unordered byte channel and drives the negotiation:
//!
//! 1. on creation, connection start is scheduled for the next scheduler
//!    tick so callers can attach state watchers first;
//! 2. a local offer goes out through the signaling channel addressed to
//!    this node type;
//! 3. remote descriptions and candidates addressed to this node type are
//!    applied as they arrive; a remote offer is answered;
//! 4. locally gathered candidates are forwarded, except the
//!    end-of-candidates sentinel;
//! 5. peer-connection state maps onto channel state, with the byte
//!    channel's own open event having the final say on OPEN.
//!
//! Negotiation errors are reported and close the channel; nothing here
//! panics out of the event loop or hangs a closer.

use crate::signaling::{SignalingChannel, SignalingMessage};
use crate::socket::ReceivedDatagram;
use crate::webrtc::{PeerConnectionState, PeerEvent, PeerFactory, PeerSession};
use crate::ChannelState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use vircadia_packets::NodeType;

enum Flow {
    Continue,
    Stop,
}

/// One negotiated data channel to a remote node.
pub struct WebrtcDataChannel {
    id: u16,
    node_type: NodeType,
    session: Arc<dyn PeerSession>,
    state_tx: watch::Sender<ChannelState>,
    inbound_tx: mpsc::UnboundedSender<ReceivedDatagram>,
}

impl WebrtcDataChannel {
    /// Create the channel and schedule negotiation.
    ///
    /// Inbound byte messages are delivered to `inbound_tx` tagged with the
    /// channel id; `id` doubles as the port of the channel's synthetic
    /// remote address.
    #[must_use]
    pub fn open(
        id: u16,
        node_type: NodeType,
        signaling: Arc<SignalingChannel>,
        factory: &dyn PeerFactory,
        inbound_tx: mpsc::UnboundedSender<ReceivedDatagram>,
    ) -> Arc<Self> {
        let (session, events) = factory.create_session();
        let (state_tx, _) = watch::channel(ChannelState::Connecting);
        let channel = Arc::new(Self {
            id,
            node_type,
            session: Arc::from(session),
            state_tx,
            inbound_tx,
        });
        tokio::spawn(Arc::clone(&channel).run(signaling, events));
        channel
    }

    /// The channel id.
    #[must_use]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The node type this channel connects to.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Synthetic remote address: WebRTC has no peer IP to expose, so the
    /// channel id stands in as the port.
    #[must_use]
    pub fn remote_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.id))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Wait for negotiation to resolve; true once OPEN, false once CLOSED.
    pub async fn opened(&self) -> bool {
        let mut rx = self.state_tx.subscribe();
        loop {
            match *rx.borrow_and_update() {
                ChannelState::Open => return true,
                ChannelState::Closed => return false,
                ChannelState::Connecting | ChannelState::Closing => {}
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Best-effort send; false (with an error report) unless OPEN.
    pub fn send(&self, bytes: &[u8]) -> bool {
        if self.state() != ChannelState::Open {
            tracing::error!(
                node_type = %self.node_type,
                state = ?self.state(),
                "data channel send while not open"
            );
            return false;
        }
        match self.session.send(bytes) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(node_type = %self.node_type, error = %e, "data channel send failed");
                false
            }
        }
    }

    /// Close the channel. Safe mid-negotiation; the channel still reaches
    /// CLOSED.
    pub async fn close(&self) {
        if matches!(self.state(), ChannelState::Closed | ChannelState::Closing) {
            return;
        }
        self.set_state(ChannelState::Closing);
        self.session.close().await;
    }

    async fn run(
        self: Arc<Self>,
        signaling: Arc<SignalingChannel>,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        // Next tick: give the creator a chance to register watchers
        tokio::task::yield_now().await;

        if signaling.wait_while_connecting().await != ChannelState::Open {
            tracing::error!(
                node_type = %self.node_type,
                "signaling channel not open; data channel cannot connect"
            );
            self.set_state(ChannelState::Closed);
            return;
        }

        // Subscribe before the offer leaves so the answer cannot be missed
        let mut signals = signaling.subscribe(self.node_type);

        match self.session.create_offer().await {
            Ok(offer) => {
                if let Err(e) = signaling.send(self.node_type, &SignalingMessage::description(offer))
                {
                    tracing::error!(node_type = %self.node_type, error = %e, "failed to send offer");
                    self.abort().await;
                    return;
                }
            }
            Err(e) => {
                tracing::error!(node_type = %self.node_type, error = %e, "offer creation failed");
                self.abort().await;
                return;
            }
        }

        let mut signals_live = true;
        loop {
            tokio::select! {
                message = signals.recv(), if signals_live => match message {
                    Some(message) => self.handle_signaling(&signaling, message).await,
                    None => {
                        signals_live = false;
                        if self.state() != ChannelState::Open {
                            tracing::error!(
                                node_type = %self.node_type,
                                "signaling channel closed during negotiation"
                            );
                            self.abort().await;
                            return;
                        }
                        tracing::debug!(
                            node_type = %self.node_type,
                            "signaling channel gone; channel stays up"
                        );
                    }
                },
                event = events.recv() => match event {
                    Some(event) => {
                        if let Flow::Stop = self.handle_event(&signaling, event).await {
                            return;
                        }
                    }
                    None => {
                        self.set_state(ChannelState::Closed);
                        return;
                    }
                },
            }
        }
    }

    async fn handle_signaling(&self, signaling: &SignalingChannel, message: SignalingMessage) {
        if let Some(description) = message.description {
            let is_offer = description.is_offer();
            if let Err(e) = self.session.set_remote_description(description).await {
                tracing::error!(node_type = %self.node_type, error = %e, "setting remote description failed");
                return;
            }
            if is_offer {
                match self.session.create_answer().await {
                    Ok(answer) => {
                        if let Err(e) = signaling
                            .send(self.node_type, &SignalingMessage::description(answer))
                        {
                            tracing::error!(node_type = %self.node_type, error = %e, "failed to send answer");
                        }
                    }
                    Err(e) => {
                        tracing::error!(node_type = %self.node_type, error = %e, "answer creation failed");
                    }
                }
            }
        } else if let Some(candidate) = message.candidate {
            if let Err(e) = self.session.add_remote_candidate(candidate).await {
                tracing::error!(node_type = %self.node_type, error = %e, "adding remote candidate failed");
            }
        } else {
            tracing::error!(node_type = %self.node_type, "unexpected signaling message");
        }
    }

    async fn handle_event(&self, signaling: &SignalingChannel, event: PeerEvent) -> Flow {
        match event {
            PeerEvent::ConnectionStateChanged(state) => match state {
                PeerConnectionState::New | PeerConnectionState::Connecting => Flow::Continue,
                // OPEN waits for the byte channel's own open event
                PeerConnectionState::Connected => Flow::Continue,
                PeerConnectionState::Disconnected
                | PeerConnectionState::Failed
                | PeerConnectionState::Closed => {
                    tracing::debug!(node_type = %self.node_type, ?state, "peer connection lost");
                    self.set_state(ChannelState::Closed);
                    self.session.close().await;
                    Flow::Stop
                }
            },
            PeerEvent::LocalCandidate(Some(candidate)) => {
                if let Err(e) = signaling.send(self.node_type, &SignalingMessage::candidate(candidate))
                {
                    tracing::error!(node_type = %self.node_type, error = %e, "failed to forward candidate");
                }
                Flow::Continue
            }
            // End-of-candidates sentinel is not forwarded
            PeerEvent::LocalCandidate(None) => Flow::Continue,
            PeerEvent::ChannelOpen => {
                tracing::debug!(node_type = %self.node_type, id = self.id, "data channel open");
                self.set_state(ChannelState::Open);
                Flow::Continue
            }
            PeerEvent::ChannelClosed => {
                tracing::debug!(node_type = %self.node_type, id = self.id, "data channel closed");
                self.set_state(ChannelState::Closed);
                self.session.close().await;
                Flow::Stop
            }
            PeerEvent::Message(data) => {
                let _ = self.inbound_tx.send(ReceivedDatagram {
                    channel_id: self.id,
                    sender: self.remote_address(),
                    data,
                });
                Flow::Continue
            }
        }
    }

    async fn abort(&self) {
        self.set_state(ChannelState::Closed);
        self.session.close().await;
    }

    fn set_state(&self, state: ChannelState) {
        self.state_tx.send_if_modified(|current| {
            // CLOSED is terminal
            if *current == state || *current == ChannelState::Closed {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LoopbackPeerFactory, MemorySignalingServer};

    async fn open_signaling(server: &MemorySignalingServer) -> Arc<SignalingChannel> {
        let channel = SignalingChannel::open("wss://domain.example", server.connector());
        assert_eq!(channel.wait_while_connecting().await, ChannelState::Open);
        channel
    }

    fn inbound() -> (
        mpsc::UnboundedSender<ReceivedDatagram>,
        mpsc::UnboundedReceiver<ReceivedDatagram>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_lifecycle_connecting_then_open() {
        let server = Arc::new(MemorySignalingServer::new());
        let signaling = open_signaling(&server).await;
        Arc::clone(&server).spawn_auto_answer();

        let factory = LoopbackPeerFactory::new();
        let (tx, _rx) = inbound();
        let channel =
            WebrtcDataChannel::open(1, NodeType::AudioMixer, signaling, &factory, tx);

        assert_eq!(channel.state(), ChannelState::Connecting);
        assert!(channel.opened().await);
        assert_eq!(channel.state(), ChannelState::Open);
    }

    #[tokio::test]
    async fn test_open_fires_exactly_once() {
        let server = Arc::new(MemorySignalingServer::new());
        let signaling = open_signaling(&server).await;
        Arc::clone(&server).spawn_auto_answer();

        let factory = LoopbackPeerFactory::new();
        let (tx, _rx) = inbound();
        let channel =
            WebrtcDataChannel::open(2, NodeType::AvatarMixer, Arc::clone(&signaling), &factory, tx);

        let mut watch = channel.state_watch();
        while *watch.borrow_and_update() != ChannelState::Open {
            watch.changed().await.unwrap();
        }
        // OPEN is reached once and the channel settles there
        tokio::task::yield_now().await;
        assert!(!watch.has_changed().unwrap());
        assert_eq!(channel.state(), ChannelState::Open);
    }

    #[tokio::test]
    async fn test_send_while_closed_returns_false() {
        let server = MemorySignalingServer::new();
        server.refuse("wss://domain.example");
        let signaling = SignalingChannel::open("wss://domain.example", server.connector());

        let factory = LoopbackPeerFactory::new();
        let (tx, _rx) = inbound();
        let channel = WebrtcDataChannel::open(3, NodeType::AudioMixer, signaling, &factory, tx);

        assert!(!channel.opened().await);
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(!channel.send(b"nope"));
    }

    #[tokio::test]
    async fn test_closed_signaling_is_a_hard_error() {
        let server = MemorySignalingServer::new();
        let signaling = open_signaling(&server).await;
        signaling.close();

        let factory = LoopbackPeerFactory::new();
        let (tx, _rx) = inbound();
        let channel = WebrtcDataChannel::open(4, NodeType::MessagesMixer, signaling, &factory, tx);
        assert!(!channel.opened().await);
    }

    #[tokio::test]
    async fn test_offer_failure_closes_channel() {
        let server = Arc::new(MemorySignalingServer::new());
        let signaling = open_signaling(&server).await;

        let factory = LoopbackPeerFactory::new();
        factory.fail_offers(true);
        let (tx, _rx) = inbound();
        let channel = WebrtcDataChannel::open(5, NodeType::AudioMixer, signaling, &factory, tx);
        assert!(!channel.opened().await);
    }

    #[tokio::test]
    async fn test_remote_offer_gets_answered() {
        let server = Arc::new(MemorySignalingServer::new());
        let signaling = open_signaling(&server).await;
        let peer = server.take_connection("wss://domain.example").await;

        let factory = LoopbackPeerFactory::new();
        let (tx, _rx) = inbound();
        let _channel =
            WebrtcDataChannel::open(6, NodeType::AudioMixer, signaling, &factory, tx);

        // Wait for the local offer so the channel is subscribed, then push
        // a remote offer at it
        loop {
            let frame = peer.recv_from_client().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            if value["data"]["description"]["type"] == "offer" {
                break;
            }
        }
        peer.send_to_client(
            r#"{"from":"M","data":{"description":{"type":"offer","sdp":"remote"}}}"#,
        );

        let mut saw_answer = false;
        for _ in 0..4 {
            let Some(frame) = peer.recv_from_client().await else {
                break;
            };
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            if value["data"]["description"]["type"] == "answer" {
                saw_answer = true;
                break;
            }
        }
        assert!(saw_answer);
    }

    #[tokio::test]
    async fn test_inbound_bytes_reach_receiver() {
        let server = Arc::new(MemorySignalingServer::new());
        let signaling = open_signaling(&server).await;
        Arc::clone(&server).spawn_auto_answer();

        let factory = LoopbackPeerFactory::new();
        factory.set_message_handler(|bytes, remote| {
            remote.deliver(bytes.to_vec());
        });
        let (tx, mut rx) = inbound();
        let channel = WebrtcDataChannel::open(7, NodeType::AudioMixer, signaling, &factory, tx);
        assert!(channel.opened().await);

        assert!(channel.send(&[9, 9, 9]));
        let datagram = rx.recv().await.unwrap();
        assert_eq!(datagram.channel_id, 7);
        assert_eq!(datagram.data, vec![9, 9, 9]);
        assert_eq!(datagram.sender, channel.remote_address());
    }

    #[tokio::test]
    async fn test_close_mid_negotiation_reaches_closed() {
        let server = Arc::new(MemorySignalingServer::new());
        let signaling = open_signaling(&server).await;
        // No auto-answer: negotiation never completes

        let factory = LoopbackPeerFactory::new();
        let (tx, _rx) = inbound();
        let channel = WebrtcDataChannel::open(8, NodeType::AudioMixer, signaling, &factory, tx);
        channel.close().await;
        assert!(!channel.opened().await);
        assert_eq!(channel.state(), ChannelState::Closed);
    }
}
