//! In-process implementations of the transport primitives.
//!
//! [`MemorySignalingServer`] stands in for the domain's signaling server
//! and [`LoopbackPeerFactory`] for a WebRTC stack. Together they let the
//! whole negotiation dance - offer out through signaling, answer back,
//! candidates, channel open, byte traffic - run inside one process, which
//! is how the unit tests, the integration harness and the demos exercise
//! the stack.

use crate::webrtc::{
    IceCandidate, PeerConnectionState, PeerEvent, PeerFactory, PeerSession, SessionDescription,
    SignalingConnection, SignalingConnector,
};
use crate::{Result, TransportError};
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// The server side of one accepted signaling connection.
pub struct ServerPeer {
    /// URL the client connected to
    pub url: String,
    to_client: mpsc::UnboundedSender<String>,
    from_client: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl ServerPeer {
    /// Push a frame to the connected client.
    pub fn send_to_client(&self, frame: &str) {
        let _ = self.to_client.send(frame.to_owned());
    }

    /// Receive the next frame from the client; `None` once it hung up.
    pub async fn recv_from_client(&self) -> Option<String> {
        self.from_client.lock().await.recv().await
    }

    /// Answer every offer envelope from the client on behalf of the node
    /// type it was addressed to, until the client hangs up.
    ///
    /// Candidates and other envelopes are dropped, which matches a remote
    /// that trickles no candidates of its own.
    pub fn spawn_auto_answer(self: Arc<Self>) {
        tokio::spawn(async move {
            while let Some(frame) = self.recv_from_client().await {
                let value: serde_json::Value = match serde_json::from_str(&frame) {
                    Ok(value) => value,
                    Err(_) => continue,
                };
                let to = value["to"].as_str().unwrap_or_default().to_owned();
                if value["data"]["description"]["type"] == "offer" {
                    let reply = serde_json::json!({
                        "from": to,
                        "data": {
                            "description": { "type": "answer", "sdp": "memory-answer" }
                        }
                    });
                    self.send_to_client(&reply.to_string());
                }
            }
        });
    }
}

/// An in-process signaling server.
pub struct MemorySignalingServer {
    accepted_tx: mpsc::UnboundedSender<Arc<ServerPeer>>,
    accepted_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<ServerPeer>>>,
    refused: Arc<DashSet<String>>,
}

impl MemorySignalingServer {
    /// Create a server accepting every connection.
    #[must_use]
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            accepted_tx,
            accepted_rx: tokio::sync::Mutex::new(accepted_rx),
            refused: Arc::new(DashSet::new()),
        }
    }

    /// A connector clients use to reach this server.
    #[must_use]
    pub fn connector(&self) -> Arc<dyn SignalingConnector> {
        Arc::new(MemoryConnector {
            accepted_tx: self.accepted_tx.clone(),
            refused: Arc::clone(&self.refused),
        })
    }

    /// Refuse future connections to `url`.
    pub fn refuse(&self, url: &str) {
        self.refused.insert(url.to_owned());
    }

    /// Take the next accepted connection for `url`.
    ///
    /// Panics if a connection for a different URL arrives first; tests
    /// drive one URL at a time.
    pub async fn take_connection(&self, url: &str) -> Arc<ServerPeer> {
        let peer = self
            .accepted_rx
            .lock()
            .await
            .recv()
            .await
            .expect("signaling server dropped");
        assert_eq!(peer.url, url, "unexpected signaling connection");
        peer
    }

    /// Accept connections forever, auto-answering every offer.
    pub fn spawn_auto_answer(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let peer = self.accepted_rx.lock().await.recv().await;
                match peer {
                    Some(peer) => peer.spawn_auto_answer(),
                    None => break,
                }
            }
        });
    }
}

impl Default for MemorySignalingServer {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryConnector {
    accepted_tx: mpsc::UnboundedSender<Arc<ServerPeer>>,
    refused: Arc<DashSet<String>>,
}

#[async_trait]
impl SignalingConnector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<SignalingConnection> {
        if self.refused.contains(url) {
            return Err(TransportError::ConnectionFailed(format!(
                "{url}: connection refused"
            )));
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let peer = Arc::new(ServerPeer {
            url: url.to_owned(),
            to_client: server_tx,
            from_client: tokio::sync::Mutex::new(server_rx),
        });
        self.accepted_tx
            .send(peer)
            .map_err(|_| TransportError::ConnectionFailed("signaling server gone".into()))?;

        Ok(SignalingConnection {
            outbound: client_tx,
            inbound: client_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Peer sessions
// ---------------------------------------------------------------------------

/// Handle for injecting inbound data-channel bytes into a loopback session.
#[derive(Clone)]
pub struct LoopbackRemote {
    events: mpsc::UnboundedSender<PeerEvent>,
}

impl LoopbackRemote {
    /// Deliver `bytes` to the session as an inbound channel message.
    pub fn deliver(&self, bytes: Vec<u8>) {
        let _ = self.events.send(PeerEvent::Message(bytes));
    }

    /// Drop the channel out from under the session.
    pub fn hang_up(&self) {
        let _ = self.events.send(PeerEvent::ChannelClosed);
        let _ = self
            .events
            .send(PeerEvent::ConnectionStateChanged(PeerConnectionState::Closed));
    }
}

type MessageHandler = dyn Fn(&[u8], &LoopbackRemote) + Send + Sync;

struct LoopbackShared {
    handler: Mutex<Option<Arc<MessageHandler>>>,
    fail_offers: AtomicBool,
    sessions_created: AtomicU32,
}

/// A peer "stack" whose sessions connect in-process.
///
/// A session emits a host candidate plus the end-of-candidates sentinel
/// when an offer is created, and reports the channel open as soon as an
/// answer (either direction) completes the exchange. Bytes sent on an open
/// channel are handed to the factory's message handler together with a
/// [`LoopbackRemote`] for replies.
pub struct LoopbackPeerFactory {
    shared: Arc<LoopbackShared>,
}

impl LoopbackPeerFactory {
    /// Create a factory whose sessions discard sent bytes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(LoopbackShared {
                handler: Mutex::new(None),
                fail_offers: AtomicBool::new(false),
                sessions_created: AtomicU32::new(0),
            }),
        }
    }

    /// Install the handler invoked with every sent byte message.
    pub fn set_message_handler(
        &self,
        handler: impl Fn(&[u8], &LoopbackRemote) + Send + Sync + 'static,
    ) {
        *self.shared.handler.lock().expect("handler lock") = Some(Arc::new(handler));
    }

    /// Make `create_offer` fail, for exercising negotiation error paths.
    pub fn fail_offers(&self, fail: bool) {
        self.shared.fail_offers.store(fail, Ordering::SeqCst);
    }

    /// Number of sessions created so far.
    #[must_use]
    pub fn sessions_created(&self) -> u32 {
        self.shared.sessions_created.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackPeerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerFactory for LoopbackPeerFactory {
    fn create_session(&self) -> (Box<dyn PeerSession>, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let n = self.shared.sessions_created.fetch_add(1, Ordering::SeqCst);
        let _ = events_tx.send(PeerEvent::ConnectionStateChanged(PeerConnectionState::New));
        let session = LoopbackSession {
            events: events_tx,
            shared: Arc::clone(&self.shared),
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            label: n,
        };
        (Box::new(session), events_rx)
    }
}

struct LoopbackSession {
    events: mpsc::UnboundedSender<PeerEvent>,
    shared: Arc<LoopbackShared>,
    open: AtomicBool,
    closed: AtomicBool,
    label: u32,
}

impl LoopbackSession {
    fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    fn become_open(&self) {
        if !self.open.swap(true, Ordering::SeqCst) {
            self.emit(PeerEvent::ConnectionStateChanged(
                PeerConnectionState::Connected,
            ));
            self.emit(PeerEvent::ChannelOpen);
        }
    }
}

#[async_trait]
impl PeerSession for LoopbackSession {
    async fn create_offer(&self) -> Result<SessionDescription> {
        if self.shared.fail_offers.load(Ordering::SeqCst) {
            return Err(TransportError::Negotiation("offer creation failed".into()));
        }
        self.emit(PeerEvent::ConnectionStateChanged(
            PeerConnectionState::Connecting,
        ));
        // Candidate gathering starts with the offer; one host candidate
        // then the end-of-candidates sentinel
        self.emit(PeerEvent::LocalCandidate(Some(IceCandidate {
            candidate: format!("candidate:loopback {}", self.label),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
        })));
        self.emit(PeerEvent::LocalCandidate(None));
        Ok(SessionDescription {
            sdp_type: "offer".into(),
            sdp: format!("loopback-offer-{}", self.label),
        })
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = SessionDescription {
            sdp_type: "answer".into(),
            sdp: format!("loopback-answer-{}", self.label),
        };
        self.become_open();
        Ok(answer)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if !description.is_offer() {
            // Answer applied: the exchange is complete
            self.become_open();
        }
        Ok(())
    }

    async fn add_remote_candidate(&self, _candidate: IceCandidate) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn send(&self, bytes: &[u8]) -> Result<usize> {
        if !self.open.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ChannelNotOpen);
        }
        let handler = self.shared.handler.lock().expect("handler lock").clone();
        if let Some(handler) = handler {
            let remote = LoopbackRemote {
                events: self.events.clone(),
            };
            handler(bytes, &remote);
        }
        Ok(bytes.len())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.store(false, Ordering::SeqCst);
            self.emit(PeerEvent::ChannelClosed);
            self.emit(PeerEvent::ConnectionStateChanged(PeerConnectionState::Closed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signaling_pipe_carries_frames() {
        let server = MemorySignalingServer::new();
        let connector = server.connector();
        let mut connection = connector.connect("wss://x").await.unwrap();
        let peer = server.take_connection("wss://x").await;

        connection.outbound.send("up".into()).unwrap();
        assert_eq!(peer.recv_from_client().await.unwrap(), "up");

        peer.send_to_client("down");
        assert_eq!(connection.inbound.recv().await.unwrap(), "down");
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let server = MemorySignalingServer::new();
        server.refuse("wss://bad");
        let result = server.connector().connect("wss://bad").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_session_opens_on_answer() {
        let factory = LoopbackPeerFactory::new();
        let (session, mut events) = factory.create_session();

        session.create_offer().await.unwrap();
        session
            .set_remote_description(SessionDescription {
                sdp_type: "answer".into(),
                sdp: "a".into(),
            })
            .await
            .unwrap();

        let mut saw_open = false;
        let mut saw_sentinel = false;
        while let Ok(event) = events.try_recv() {
            match event {
                PeerEvent::ChannelOpen => saw_open = true,
                PeerEvent::LocalCandidate(None) => saw_sentinel = true,
                _ => {}
            }
        }
        assert!(saw_open);
        assert!(saw_sentinel);
    }

    #[tokio::test]
    async fn test_send_requires_open_channel() {
        let factory = LoopbackPeerFactory::new();
        let (session, _events) = factory.create_session();
        assert!(matches!(
            session.send(b"too early"),
            Err(TransportError::ChannelNotOpen)
        ));
    }

    #[tokio::test]
    async fn test_handler_sees_sent_bytes_and_can_reply() {
        let factory = LoopbackPeerFactory::new();
        factory.set_message_handler(|bytes, remote| {
            let mut echoed = bytes.to_vec();
            echoed.reverse();
            remote.deliver(echoed);
        });
        let (session, mut events) = factory.create_session();
        session.create_offer().await.unwrap();
        session
            .set_remote_description(SessionDescription {
                sdp_type: "answer".into(),
                sdp: "a".into(),
            })
            .await
            .unwrap();

        session.send(&[1, 2, 3]).unwrap();
        loop {
            match events.recv().await.unwrap() {
                PeerEvent::Message(bytes) => {
                    assert_eq!(bytes, vec![3, 2, 1]);
                    break;
                }
                _ => continue,
            }
        }
    }
}
