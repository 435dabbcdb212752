//! The signaling channel.
//!
//! One persistent, message-oriented connection per domain URL carries the
//! WebRTC negotiation envelopes for every node type connecting to that
//! domain. Outbound envelopes are addressed `{"to": <type-char>, "data":
//! ...}`; inbound envelopes arrive as `{"from": <type-char>, "data": ...}`
//! and are routed to the subscriber for that node type. Echo envelopes and
//! envelopes for node types without a subscriber are dropped.

use crate::webrtc::{IceCandidate, SessionDescription, SignalingConnector};
use crate::{ChannelState, Result, TransportError};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use vircadia_packets::NodeType;

/// The negotiation payload carried inside a signaling envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalingMessage {
    /// A session description, if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<SessionDescription>,
    /// An ICE candidate, if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceCandidate>,
}

impl SignalingMessage {
    /// Envelope carrying a session description.
    #[must_use]
    pub fn description(description: SessionDescription) -> Self {
        Self {
            description: Some(description),
            candidate: None,
        }
    }

    /// Envelope carrying an ICE candidate.
    #[must_use]
    pub fn candidate(candidate: IceCandidate) -> Self {
        Self {
            description: None,
            candidate: Some(candidate),
        }
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    to: String,
    data: &'a SignalingMessage,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    from: Option<String>,
    data: Option<SignalingMessage>,
    echo: Option<serde_json::Value>,
}

/// A signaling channel to one domain URL, shared by all node types.
pub struct SignalingChannel {
    url: String,
    state_tx: watch::Sender<ChannelState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    subscribers: DashMap<NodeType, mpsc::UnboundedSender<SignalingMessage>>,
}

impl SignalingChannel {
    /// Start connecting to `url`.
    ///
    /// Returns immediately in CONNECTING; the connection attempt runs in
    /// the background and moves the channel to OPEN or CLOSED.
    #[must_use]
    pub fn open(url: &str, connector: Arc<dyn SignalingConnector>) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ChannelState::Connecting);
        let channel = Arc::new(Self {
            url: url.to_owned(),
            state_tx,
            outbound: Mutex::new(None),
            subscribers: DashMap::new(),
        });
        tokio::spawn(Arc::clone(&channel).run(connector));
        channel
    }

    async fn run(self: Arc<Self>, connector: Arc<dyn SignalingConnector>) {
        let connection = match connector.connect(&self.url).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "signaling connection failed");
                self.shut_down();
                return;
            }
        };

        // A close that raced the connection attempt wins
        if *self.state_tx.borrow() != ChannelState::Connecting {
            self.shut_down();
            return;
        }
        *self.outbound.lock().expect("outbound lock") = Some(connection.outbound);
        self.set_state(ChannelState::Open);
        tracing::debug!(url = %self.url, "signaling channel open");

        let mut inbound = connection.inbound;
        let mut state_rx = self.state_tx.subscribe();
        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(frame) => self.route_frame(&frame),
                    None => {
                        tracing::warn!(url = %self.url, "signaling wire closed by remote");
                        break;
                    }
                },
                changed = state_rx.changed() => {
                    if changed.is_err() || *state_rx.borrow() == ChannelState::Closing {
                        break;
                    }
                }
            }
        }
        self.shut_down();
    }

    fn route_frame(&self, frame: &str) {
        let envelope: InboundEnvelope = match serde_json::from_str(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "undecodable signaling frame");
                return;
            }
        };

        if envelope.echo.is_some() {
            tracing::trace!(url = %self.url, "ignoring signaling echo");
            return;
        }

        let (from, data) = match (envelope.from, envelope.data) {
            (Some(from), Some(data)) => (from, data),
            _ => {
                tracing::error!(url = %self.url, "unexpected signaling message shape");
                return;
            }
        };

        let node_type = match from.bytes().next() {
            Some(code) => NodeType::from_u8(code),
            None => {
                tracing::error!(url = %self.url, "signaling message with empty sender");
                return;
            }
        };

        let subscriber_gone = match self.subscribers.get(&node_type) {
            Some(subscriber) => subscriber.send(data).is_err(),
            None => {
                tracing::trace!(url = %self.url, %node_type, "no subscriber for signaling message");
                false
            }
        };
        if subscriber_gone {
            self.subscribers.remove(&node_type);
        }
    }

    /// The domain URL this channel signals for.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
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

    /// Wait until the connection attempt resolves; returns the resulting
    /// state (OPEN, or CLOSED on failure).
    pub async fn wait_while_connecting(&self) -> ChannelState {
        let mut rx = self.state_tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if state != ChannelState::Connecting {
                return state;
            }
            if rx.changed().await.is_err() {
                return ChannelState::Closed;
            }
        }
    }

    /// Subscribe to inbound envelopes addressed from `node_type`.
    ///
    /// One subscriber per node type; a second subscription replaces the
    /// first.
    #[must_use]
    pub fn subscribe(&self, node_type: NodeType) -> mpsc::UnboundedReceiver<SignalingMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(node_type, tx);
        rx
    }

    /// Send a negotiation envelope addressed to `node_type`.
    ///
    /// Fails unless the channel is OPEN.
    pub fn send(&self, to: NodeType, message: &SignalingMessage) -> Result<()> {
        if self.state() != ChannelState::Open {
            tracing::error!(url = %self.url, %to, "signaling send while not open");
            return Err(TransportError::SignalingNotOpen);
        }

        let envelope = OutboundEnvelope {
            to: to.as_char().to_string(),
            data: message,
        };
        let json = serde_json::to_string(&envelope)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let outbound = self.outbound.lock().expect("outbound lock");
        match outbound.as_ref() {
            Some(sender) => sender.send(json).map_err(|_| TransportError::Closed),
            None => Err(TransportError::SignalingNotOpen),
        }
    }

    /// Close the channel; subscribers see their streams end.
    pub fn close(&self) {
        if matches!(self.state(), ChannelState::Closed | ChannelState::Closing) {
            return;
        }
        self.set_state(ChannelState::Closing);
    }

    fn shut_down(&self) {
        *self.outbound.lock().expect("outbound lock") = None;
        self.subscribers.clear();
        self.set_state(ChannelState::Closed);
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
    use crate::memory::MemorySignalingServer;

    #[tokio::test]
    async fn test_open_reaches_open_state() {
        let server = MemorySignalingServer::new();
        let channel = SignalingChannel::open("wss://domain.example", server.connector());
        assert_eq!(channel.wait_while_connecting().await, ChannelState::Open);
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let server = MemorySignalingServer::new();
        let channel = SignalingChannel::open("wss://domain.example", server.connector());
        // Still CONNECTING on this tick
        let result = channel.send(NodeType::AudioMixer, &SignalingMessage::default());
        assert!(matches!(result, Err(TransportError::SignalingNotOpen)));
    }

    #[tokio::test]
    async fn test_routing_by_sender_type() {
        let server = MemorySignalingServer::new();
        let channel = SignalingChannel::open("wss://domain.example", server.connector());
        channel.wait_while_connecting().await;
        let mut audio = channel.subscribe(NodeType::AudioMixer);
        let mut avatar = channel.subscribe(NodeType::AvatarMixer);

        let peer = server.take_connection("wss://domain.example").await;
        peer.send_to_client(r#"{"from":"M","data":{"candidate":{"candidate":"c1"}}}"#);
        peer.send_to_client(r#"{"echo":"ping"}"#);
        peer.send_to_client(r#"{"from":"W","data":{"candidate":{"candidate":"c2"}}}"#);

        let to_audio = audio.recv().await.unwrap();
        assert_eq!(to_audio.candidate.unwrap().candidate, "c1");
        let to_avatar = avatar.recv().await.unwrap();
        assert_eq!(to_avatar.candidate.unwrap().candidate, "c2");
    }

    #[tokio::test]
    async fn test_close_ends_subscriber_streams() {
        let server = MemorySignalingServer::new();
        let channel = SignalingChannel::open("wss://domain.example", server.connector());
        channel.wait_while_connecting().await;
        let mut sub = channel.subscribe(NodeType::DomainServer);

        channel.close();
        assert!(sub.recv().await.is_none());
        assert_eq!(channel.wait_while_connecting().await, ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_envelope_wire_shape() {
        let server = MemorySignalingServer::new();
        let channel = SignalingChannel::open("wss://domain.example", server.connector());
        channel.wait_while_connecting().await;
        let peer = server.take_connection("wss://domain.example").await;

        let message = SignalingMessage::description(SessionDescription {
            sdp_type: "offer".into(),
            sdp: "v=0".into(),
        });
        channel.send(NodeType::AudioMixer, &message).unwrap();

        let frame = peer.recv_from_client().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["to"], "M");
        assert_eq!(value["data"]["description"]["type"], "offer");
    }
}
