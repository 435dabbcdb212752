//! Error types for the transport layer.

use thiserror::Error;

/// Transport layer errors.
///
/// Transport failures are reported and the affected channel transitions to
/// CLOSED; the layer above retries on its own schedule (the check-in timer
/// retries naturally). Nothing here tears down other channels.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The signaling channel was required but is not open
    #[error("signaling channel is not open")]
    SignalingNotOpen,

    /// The data channel was required but is not open
    #[error("data channel is not open")]
    ChannelNotOpen,

    /// Establishing the underlying connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Offer/answer or candidate exchange failed
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// An inbound signaling envelope could not be understood
    #[error("invalid signaling message: {0}")]
    InvalidSignalingMessage(String),

    /// The channel closed underneath an operation
    #[error("channel closed")]
    Closed,

    /// The underlying primitive refused a send
    #[error("send failed: {0}")]
    SendFailed(String),
}
