//! Packet dispatch.
//!
//! A single map from packet type to listener. Registration is 1:1 - a
//! second registration for a type replaces the first, there is no fan-out.
//! Each listener declares up front whether it expects sourced invocation
//! (message plus sending node) or unsourced (message only); the flag and
//! the pending-delivery policy are plain struct fields, not runtime
//! augmentation.

use crate::node::Node;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use vircadia_packets::{PacketType, ReceivedMessage, SessionPacket};

/// The callback half of a listener registration.
pub enum ListenerCallback {
    /// Invoked with the message and the sending node. The node is `None`
    /// only for listeners registered with `deliver_pending`.
    Sourced(Box<dyn Fn(ReceivedMessage, Option<Arc<Node>>) + Send + Sync>),
    /// Invoked with the message alone; for unsourced packet types.
    Unsourced(Box<dyn Fn(ReceivedMessage) + Send + Sync>),
}

/// A listener registration.
pub struct Listener {
    /// The callback and its invocation shape
    pub callback: ListenerCallback,
    /// Deliver sourced packets even when the sending node is not (yet)
    /// known to the registry
    pub deliver_pending: bool,
}

impl Listener {
    /// A sourced listener that requires a known sending node.
    #[must_use]
    pub fn sourced(
        callback: impl Fn(ReceivedMessage, Option<Arc<Node>>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: ListenerCallback::Sourced(Box::new(callback)),
            deliver_pending: false,
        }
    }

    /// An unsourced listener.
    #[must_use]
    pub fn unsourced(callback: impl Fn(ReceivedMessage) + Send + Sync + 'static) -> Self {
        Self {
            callback: ListenerCallback::Unsourced(Box::new(callback)),
            deliver_pending: false,
        }
    }

    /// Allow delivery while the sending node is still unknown.
    #[must_use]
    pub fn with_deliver_pending(mut self) -> Self {
        self.deliver_pending = true;
        self
    }
}

/// The type-to-listener dispatch map.
pub struct PacketReceiver {
    listeners: DashMap<PacketType, Listener>,
    pending_messages: DashMap<(SocketAddr, u32), ReceivedMessage>,
}

impl PacketReceiver {
    /// An empty receiver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            pending_messages: DashMap::new(),
        }
    }

    /// Register `listener` for `packet_type`, replacing any previous
    /// registration.
    pub fn register_listener(&self, packet_type: PacketType, listener: Listener) {
        if self.listeners.insert(packet_type, listener).is_some() {
            tracing::debug!(%packet_type, "listener replaced");
        }
    }

    /// True if a listener is registered for `packet_type`.
    #[must_use]
    pub fn is_registered(&self, packet_type: PacketType) -> bool {
        self.listeners.contains_key(&packet_type)
    }

    /// Dispatch a decoded session packet to its registered listener.
    ///
    /// Multi-packet messages are held until complete. An unregistered type
    /// is reported by name and dropped - a diagnostic, not a crash.
    pub fn handle_verified_packet(&self, packet: &SessionPacket, source_node: Option<Arc<Node>>) {
        let message = match self.assemble(packet) {
            Some(message) => message,
            None => return, // waiting for more parts
        };
        self.dispatch(message, source_node);
    }

    fn assemble(&self, packet: &SessionPacket) -> Option<ReceivedMessage> {
        let message_number = packet.transport().header().message.map(|m| m.message_number);
        let Some(message_number) = message_number else {
            return Some(ReceivedMessage::from_packet(packet));
        };

        let key = (packet.transport().raw().sender(), message_number);
        let complete = match self.pending_messages.get_mut(&key) {
            Some(mut entry) => {
                entry.append_packet(packet);
                entry.is_complete()
            }
            None => {
                let message = ReceivedMessage::from_packet(packet);
                if !message.is_complete() {
                    self.pending_messages.insert(key, message);
                    return None;
                }
                return Some(message);
            }
        };

        if complete {
            self.pending_messages.remove(&key).map(|(_, m)| m)
        } else {
            None
        }
    }

    fn dispatch(&self, message: ReceivedMessage, source_node: Option<Arc<Node>>) {
        let packet_type = message.packet_type();
        let Some(listener) = self.listeners.get(&packet_type) else {
            tracing::error!(%packet_type, "no listener registered for packet type");
            return;
        };

        match &listener.callback {
            ListenerCallback::Unsourced(callback) => callback(message),
            ListenerCallback::Sourced(callback) => {
                if source_node.is_none() && !listener.deliver_pending {
                    tracing::debug!(
                        %packet_type,
                        source_id = ?message.source_id(),
                        "dropping sourced packet from unknown node"
                    );
                    return;
                }
                callback(message, source_node);
            }
        }
    }
}

impl Default for PacketReceiver {
    fn default() -> Self {
        Self::new()
    }
}
