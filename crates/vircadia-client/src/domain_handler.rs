//! The domain connection state machine.
//!
//! One handler tracks one domain connection: the target URL, the identity
//! the domain assigned us (session UUID and 16-bit local ID), and the
//! connectivity edge. Every mutation comes from the check-in response path
//! or an explicit reset; the connected/disconnected signals fire exactly
//! once per edge.

use crate::signal::Signal;
use std::sync::Mutex;
use uuid::Uuid;

/// Connection states of the domain handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    /// No target domain
    NoUrl,
    /// A URL is set; no connect request has gone out yet
    UrlPending,
    /// Connect requests are being sent
    Connecting,
    /// A DomainList response established the session
    Connected,
}

#[derive(Debug)]
struct Inner {
    state: DomainState,
    url: Option<String>,
    domain_uuid: Uuid,
    session_uuid: Uuid,
    local_id: u16,
    permissions: u32,
    ready_port: Option<u16>,
}

/// Tracks one domain connection's identity and connectivity.
pub struct DomainHandler {
    inner: Mutex<Inner>,
    connected: Signal<String>,
    disconnected: Signal<()>,
}

impl DomainHandler {
    /// A handler with no target domain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: DomainState::NoUrl,
                url: None,
                domain_uuid: Uuid::nil(),
                session_uuid: Uuid::nil(),
                local_id: 0,
                permissions: 0,
                ready_port: None,
            }),
            connected: Signal::new(),
            disconnected: Signal::new(),
        }
    }

    /// Target a (new) domain.
    ///
    /// Dropping an established connection this way fires the disconnected
    /// signal before the handler returns to URL-pending.
    pub fn set_url(&self, url: &str) {
        let was_connected = {
            let mut inner = self.inner.lock().expect("domain lock");
            let was_connected = inner.state == DomainState::Connected;
            if inner.url.as_deref() == Some(url) && !was_connected {
                // Same target, nothing established: keep retrying as-is
                return;
            }
            inner.url = Some(url.to_owned());
            inner.state = DomainState::UrlPending;
            inner.domain_uuid = Uuid::nil();
            inner.session_uuid = Uuid::nil();
            inner.local_id = 0;
            inner.permissions = 0;
            inner.ready_port = None;
            was_connected
        };
        tracing::info!(url, "domain target set");
        if was_connected {
            self.disconnected.emit(());
        }
    }

    /// Forget the target domain entirely.
    pub fn reset(&self) {
        let was_connected = {
            let mut inner = self.inner.lock().expect("domain lock");
            let was_connected = inner.state == DomainState::Connected;
            *inner = Inner {
                state: DomainState::NoUrl,
                url: None,
                domain_uuid: Uuid::nil(),
                session_uuid: Uuid::nil(),
                local_id: 0,
                permissions: 0,
                ready_port: None,
            };
            was_connected
        };
        if was_connected {
            self.disconnected.emit(());
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DomainState {
        self.inner.lock().expect("domain lock").state
    }

    /// The target URL, if one is set.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.inner.lock().expect("domain lock").url.clone()
    }

    /// True while connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == DomainState::Connected
    }

    /// The domain server's UUID, nil until connected.
    #[must_use]
    pub fn domain_uuid(&self) -> Uuid {
        self.inner.lock().expect("domain lock").domain_uuid
    }

    /// The session UUID the domain assigned us, nil until connected.
    #[must_use]
    pub fn session_uuid(&self) -> Uuid {
        self.inner.lock().expect("domain lock").session_uuid
    }

    /// The 16-bit local ID the domain assigned us.
    #[must_use]
    pub fn local_id(&self) -> u16 {
        self.inner.lock().expect("domain lock").local_id
    }

    /// Permissions granted by the domain.
    #[must_use]
    pub fn permissions(&self) -> u32 {
        self.inner.lock().expect("domain lock").permissions
    }

    /// Sentinel port recorded when the domain data channel first opened;
    /// `None` until then.
    #[must_use]
    pub fn ready_port(&self) -> Option<u16> {
        self.inner.lock().expect("domain lock").ready_port
    }

    /// Record the domain data channel's synthetic port on first open.
    pub fn set_ready_port(&self, port: u16) {
        let mut inner = self.inner.lock().expect("domain lock");
        if inner.ready_port.is_none() {
            inner.ready_port = Some(port);
        }
    }

    /// Note that connect requests are going out.
    pub fn set_connecting(&self) {
        let mut inner = self.inner.lock().expect("domain lock");
        if inner.state == DomainState::UrlPending {
            inner.state = DomainState::Connecting;
        }
    }

    /// Apply the identity from a valid DomainList response.
    ///
    /// Returns true (and fires the connected signal once, carrying the
    /// URL) on the not-connected to connected edge; a DomainList arriving
    /// while already connected changes nothing and fires nothing.
    pub fn set_connected(
        &self,
        domain_uuid: Uuid,
        _domain_local_id: u16,
        session_uuid: Uuid,
        local_id: u16,
        permissions: u32,
    ) -> bool {
        let url = {
            let mut inner = self.inner.lock().expect("domain lock");
            if inner.state == DomainState::Connected {
                return false;
            }
            let Some(url) = inner.url.clone() else {
                tracing::warn!("DomainList with no domain targeted; ignoring");
                return false;
            };
            inner.state = DomainState::Connected;
            inner.domain_uuid = domain_uuid;
            inner.session_uuid = session_uuid;
            inner.local_id = local_id;
            inner.permissions = permissions;
            url
        };
        tracing::info!(
            url,
            session = %session_uuid,
            local_id,
            "connected to domain"
        );
        self.connected.emit(url);
        true
    }

    /// Drop an established connection; fires the disconnected signal on
    /// the true-to-false edge only.
    pub fn set_disconnected(&self, reason: &str) {
        {
            let mut inner = self.inner.lock().expect("domain lock");
            if inner.state != DomainState::Connected {
                return;
            }
            inner.state = DomainState::UrlPending;
            inner.domain_uuid = Uuid::nil();
            inner.session_uuid = Uuid::nil();
            inner.local_id = 0;
            inner.permissions = 0;
        }
        tracing::info!(reason, "disconnected from domain");
        self.disconnected.emit(());
    }

    /// Subscribe to the connected-to-domain signal (carries the URL).
    #[must_use]
    pub fn connected_signal(&self) -> &Signal<String> {
        &self.connected
    }

    /// Subscribe to the disconnected-from-domain signal.
    #[must_use]
    pub fn disconnected_signal(&self) -> &Signal<()> {
        &self.disconnected
    }
}

impl Default for DomainHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_no_url() {
        let handler = DomainHandler::new();
        assert_eq!(handler.state(), DomainState::NoUrl);
        assert!(!handler.is_connected());
        assert_eq!(handler.url(), None);
    }

    #[test]
    fn test_set_url_moves_to_pending() {
        let handler = DomainHandler::new();
        handler.set_url("wss://alpha.example");
        assert_eq!(handler.state(), DomainState::UrlPending);
        assert_eq!(handler.url().as_deref(), Some("wss://alpha.example"));
    }

    #[tokio::test]
    async fn test_domain_list_connects_and_signals_once() {
        let handler = DomainHandler::new();
        handler.set_url("wss://alpha.example");
        let mut connected = handler.connected_signal().connect();

        let domain = Uuid::new_v4();
        let session = Uuid::new_v4();
        assert!(handler.set_connected(domain, 9, session, 1234, 0x7F));
        assert!(handler.is_connected());
        assert_eq!(handler.domain_uuid(), domain);
        assert_eq!(handler.session_uuid(), session);
        assert_eq!(handler.local_id(), 1234);

        // A second DomainList while connected changes nothing
        assert!(!handler.set_connected(domain, 9, Uuid::new_v4(), 1, 0));
        assert_eq!(handler.local_id(), 1234);

        assert_eq!(connected.recv().await.as_deref(), Some("wss://alpha.example"));
        assert!(connected.try_recv().is_err(), "signal fired more than once");
    }

    #[tokio::test]
    async fn test_disconnect_edge_fires_once() {
        let handler = DomainHandler::new();
        handler.set_url("wss://alpha.example");
        handler.set_connected(Uuid::new_v4(), 1, Uuid::new_v4(), 2, 0);
        let mut disconnected = handler.disconnected_signal().connect();

        handler.set_disconnected("test");
        assert_eq!(handler.state(), DomainState::UrlPending);
        assert_eq!(handler.session_uuid(), Uuid::nil());

        handler.set_disconnected("again");
        assert_eq!(disconnected.recv().await, Some(()));
        assert!(disconnected.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retargeting_connected_domain_disconnects() {
        let handler = DomainHandler::new();
        handler.set_url("wss://alpha.example");
        handler.set_connected(Uuid::new_v4(), 1, Uuid::new_v4(), 2, 0);
        let mut disconnected = handler.disconnected_signal().connect();

        handler.set_url("wss://beta.example");
        assert_eq!(handler.state(), DomainState::UrlPending);
        assert_eq!(disconnected.recv().await, Some(()));
    }

    #[test]
    fn test_ready_port_records_first_open_only() {
        let handler = DomainHandler::new();
        assert_eq!(handler.ready_port(), None);
        handler.set_ready_port(4);
        handler.set_ready_port(9);
        assert_eq!(handler.ready_port(), Some(4));
    }

    #[test]
    fn test_domain_list_without_url_ignored() {
        let handler = DomainHandler::new();
        assert!(!handler.set_connected(Uuid::new_v4(), 1, Uuid::new_v4(), 2, 0));
        assert!(!handler.is_connected());
    }
}
