//! Trait seams over the WebRTC primitives.
//!
//! This stack is not a WebRTC implementation: it assumes a peer connection
//! with one unreliable, unordered, zero-retransmission data channel and a
//! message-oriented signaling wire are available, and drives them through
//! the traits here. Production builds bind a real WebRTC stack; tests and
//! demos use the in-process implementations in [`crate::memory`].

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An SDP session description exchanged during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// `"offer"` or `"answer"`
    #[serde(rename = "type")]
    pub sdp_type: String,
    /// The SDP body
    pub sdp: String,
}

impl SessionDescription {
    /// True if this description is an offer.
    #[must_use]
    pub fn is_offer(&self) -> bool {
        self.sdp_type == "offer"
    }
}

/// An ICE candidate exchanged during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// The candidate attribute line
    pub candidate: String,
    /// Media stream identification tag
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Media line index
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u32>,
}

/// Peer connection states as surfaced by the underlying stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    /// Freshly created
    New,
    /// ICE/DTLS in progress
    Connecting,
    /// Transport established (the data channel may still be opening)
    Connected,
    /// Transport lost, may recover
    Disconnected,
    /// Transport failed permanently
    Failed,
    /// Closed
    Closed,
}

/// Events emitted by a [`PeerSession`].
#[derive(Debug)]
pub enum PeerEvent {
    /// The peer connection changed state
    ConnectionStateChanged(PeerConnectionState),
    /// A locally gathered ICE candidate; `None` is the end-of-candidates
    /// sentinel and must not be forwarded
    LocalCandidate(Option<IceCandidate>),
    /// The data channel opened
    ChannelOpen,
    /// The data channel closed
    ChannelClosed,
    /// Bytes arrived on the data channel
    Message(Vec<u8>),
}

/// One peer connection plus its single unreliable data channel.
///
/// Delivery over the channel is best-effort and unordered with no
/// retransmission; consumers detect loss and reordering themselves via
/// packet sequence numbers.
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Generate a local offer.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Generate an answer to a previously applied remote offer.
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply a remote session description.
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Apply a remote ICE candidate.
    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Best-effort send on the data channel; returns the byte count.
    fn send(&self, bytes: &[u8]) -> Result<usize>;

    /// Release the peer connection.
    async fn close(&self);
}

/// Factory for [`PeerSession`]s.
pub trait PeerFactory: Send + Sync {
    /// Create a session and the receiving end of its event stream.
    fn create_session(&self) -> (Box<dyn PeerSession>, mpsc::UnboundedReceiver<PeerEvent>);
}

/// An established signaling wire: text frames in both directions.
///
/// The inbound receiver yields `None` once the wire is gone; sends fail at
/// that point.
pub struct SignalingConnection {
    /// Frames to the signaling server
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames from the signaling server
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Connector for the signaling wire (WebSocket in production).
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Open a message-oriented connection to `url`.
    async fn connect(&self, url: &str) -> Result<SignalingConnection>;
}
