//! The multiplexed WebRTC socket.
//!
//! One registry of data channels keyed by (domain URL, node type), sharing
//! one signaling channel per URL. Everything above this layer addresses
//! peers by node type once a domain URL is established; this is the only
//! component that knows about the URL-to-node-type cardinality.

use crate::data_channel::WebrtcDataChannel;
use crate::signaling::SignalingChannel;
use crate::webrtc::{PeerFactory, SignalingConnector};
use crate::ChannelState;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use vircadia_packets::NodeType;

/// One byte message received on some data channel.
#[derive(Debug)]
pub struct ReceivedDatagram {
    /// Id of the channel it arrived on
    pub channel_id: u16,
    /// The channel's synthetic remote address
    pub sender: SocketAddr,
    /// The message bytes
    pub data: Vec<u8>,
}

/// Connection state as seen by consumers of the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live channel for the key
    Unconnected,
    /// Negotiation in progress
    Connecting,
    /// Channel open
    Connected,
}

fn map_state(state: ChannelState) -> ConnectionState {
    match state {
        ChannelState::Open => ConnectionState::Connected,
        ChannelState::Connecting => ConnectionState::Connecting,
        ChannelState::Closing | ChannelState::Closed => ConnectionState::Unconnected,
    }
}

/// Registry of data channels multiplexed over per-URL signaling channels.
pub struct WebrtcSocket {
    connector: Arc<dyn SignalingConnector>,
    factory: Arc<dyn PeerFactory>,
    signaling: DashMap<String, Arc<SignalingChannel>>,
    channels: DashMap<(String, NodeType), Arc<WebrtcDataChannel>>,
    by_id: DashMap<u16, Arc<WebrtcDataChannel>>,
    next_id: AtomicU16,
    inbound_tx: mpsc::UnboundedSender<ReceivedDatagram>,
}

impl WebrtcSocket {
    /// Create a socket over the given primitive implementations.
    ///
    /// Returns the socket and the stream of datagrams received on all of
    /// its channels.
    #[must_use]
    pub fn new(
        connector: Arc<dyn SignalingConnector>,
        factory: Arc<dyn PeerFactory>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ReceivedDatagram>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let socket = Arc::new(Self {
            connector,
            factory,
            signaling: DashMap::new(),
            channels: DashMap::new(),
            by_id: DashMap::new(),
            next_id: AtomicU16::new(1),
            inbound_tx,
        });
        (socket, inbound_rx)
    }

    /// The signaling channel for `url`, opening one if needed.
    ///
    /// Shared across every node type connecting to the same URL; a closed
    /// channel is replaced by a fresh connection attempt.
    pub fn ensure_signaling(&self, url: &str) -> Arc<SignalingChannel> {
        if let Some(existing) = self.signaling.get(url) {
            if existing.state() != ChannelState::Closed {
                return Arc::clone(&existing);
            }
        }
        let channel = SignalingChannel::open(url, Arc::clone(&self.connector));
        self.signaling.insert(url.to_owned(), Arc::clone(&channel));
        channel
    }

    /// State of the signaling channel for `url`.
    #[must_use]
    pub fn signaling_state(&self, url: &str) -> ConnectionState {
        self.signaling
            .get(url)
            .map(|c| map_state(c.state()))
            .unwrap_or(ConnectionState::Unconnected)
    }

    /// The data channel for (`url`, `node_type`), creating and negotiating
    /// one if there is none alive.
    ///
    /// `on_open` fires with the channel id once the channel is OPEN - at
    /// once for a channel that already is, never for one that dies first.
    pub fn connect_to_host(
        &self,
        url: &str,
        node_type: NodeType,
        on_open: impl FnOnce(u16) + Send + 'static,
    ) -> Arc<WebrtcDataChannel> {
        let key = (url.to_owned(), node_type);
        if let Some(existing) = self.channels.get(&key) {
            match existing.state() {
                ChannelState::Open => {
                    let channel = Arc::clone(&existing);
                    on_open(channel.id());
                    return channel;
                }
                ChannelState::Connecting => {
                    let channel = Arc::clone(&existing);
                    Self::notify_on_open(&channel, on_open);
                    return channel;
                }
                ChannelState::Closing | ChannelState::Closed => {
                    drop(existing);
                    self.channels.remove(&key);
                }
            }
        }

        let signaling = self.ensure_signaling(url);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(url, %node_type, id, "opening data channel");
        let channel = WebrtcDataChannel::open(
            id,
            node_type,
            signaling,
            self.factory.as_ref(),
            self.inbound_tx.clone(),
        );
        self.channels.insert(key, Arc::clone(&channel));
        self.by_id.insert(id, Arc::clone(&channel));
        Self::notify_on_open(&channel, on_open);
        channel
    }

    fn notify_on_open(channel: &Arc<WebrtcDataChannel>, on_open: impl FnOnce(u16) + Send + 'static) {
        let channel = Arc::clone(channel);
        tokio::spawn(async move {
            if channel.opened().await {
                on_open(channel.id());
            }
        });
    }

    /// State of the data channel for (`url`, `node_type`); absence means
    /// UNCONNECTED.
    #[must_use]
    pub fn state(&self, url: &str, node_type: NodeType) -> ConnectionState {
        self.channels
            .get(&(url.to_owned(), node_type))
            .map(|c| map_state(c.state()))
            .unwrap_or(ConnectionState::Unconnected)
    }

    /// The live channel for (`url`, `node_type`), if any.
    #[must_use]
    pub fn channel(&self, url: &str, node_type: NodeType) -> Option<Arc<WebrtcDataChannel>> {
        self.channels
            .get(&(url.to_owned(), node_type))
            .map(|c| Arc::clone(&c))
    }

    /// The channel with the given id, if it is still registered.
    #[must_use]
    pub fn channel_by_id(&self, id: u16) -> Option<Arc<WebrtcDataChannel>> {
        self.by_id.get(&id).map(|c| Arc::clone(&c))
    }

    /// Best-effort send to the channel for (`url`, `node_type`).
    pub fn send_to(&self, url: &str, node_type: NodeType, bytes: &[u8]) -> bool {
        match self.channel(url, node_type) {
            Some(channel) => channel.send(bytes),
            None => {
                tracing::error!(url, %node_type, "send to unconnected node type");
                false
            }
        }
    }

    /// Best-effort send to the channel whose synthetic address is `addr`.
    pub fn send_to_address(&self, addr: SocketAddr, bytes: &[u8]) -> bool {
        match self.channel_by_id(addr.port()) {
            Some(channel) => channel.send(bytes),
            None => {
                tracing::error!(%addr, "send to unknown channel address");
                false
            }
        }
    }

    /// Tear down every data channel and signaling connection.
    pub async fn clear_connections(&self) {
        let channels: Vec<_> = self
            .channels
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.channels.clear();
        self.by_id.clear();
        for channel in channels {
            channel.close().await;
        }

        let signaling: Vec<_> = self
            .signaling
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.signaling.clear();
        for channel in signaling {
            channel.close();
        }
        tracing::debug!("all connections cleared");
    }

    /// Alias for [`Self::clear_connections`], used on hard resets.
    pub async fn abort(&self) {
        self.clear_connections().await;
    }
}
