//! # Vircadia Transport
//!
//! The WebRTC-based multiplexed transport under the Vircadia protocol
//! stack.
//!
//! One signaling channel per domain URL carries connection-negotiation
//! envelopes for every node type; one data channel per (URL, node type)
//! pair carries packet bytes with unreliable, unordered, zero-retransmit
//! semantics. The [`WebrtcSocket`] multiplexes all of them behind a single
//! send/receive/state surface.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ WebrtcSocket      (url, node type) -> data channel         │
//! ├──────────────────────────────┬─────────────────────────────┤
//! │ WebrtcDataChannel (per pair) │ SignalingChannel (per URL)  │
//! ├──────────────────────────────┴─────────────────────────────┤
//! │ PeerSession / SignalingConnector      (primitive seams)    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The WebRTC peer connection and the signaling wire are assumed
//! primitives, abstracted behind the traits in [`webrtc`]; the [`memory`]
//! module provides in-process implementations for tests and demos.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod data_channel;
pub mod error;
pub mod memory;
pub mod signaling;
pub mod socket;
pub mod webrtc;

pub use data_channel::WebrtcDataChannel;
pub use error::TransportError;
pub use signaling::{SignalingChannel, SignalingMessage};
pub use socket::{ConnectionState, ReceivedDatagram, WebrtcSocket};
pub use webrtc::{
    IceCandidate, PeerConnectionState, PeerEvent, PeerFactory, PeerSession, SessionDescription,
    SignalingConnection, SignalingConnector,
};

/// Lifecycle states shared by the signaling channel and data channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Connection attempt in progress
    Connecting,
    /// Ready for traffic
    Open,
    /// Shutdown initiated
    Closing,
    /// No longer usable
    Closed,
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
