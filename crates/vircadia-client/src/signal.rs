//! Deferred-emission signals.
//!
//! The protocol layer announces state changes (connected, node added,
//! node killed) without calling into consumers inline: `emit` queues the
//! value to every live subscriber, and subscribers drain their queue on
//! their own scheduling tick. Emitters can therefore fire from inside any
//! lock or event handler without re-entrancy hazards.

use std::sync::Mutex;
use tokio::sync::mpsc;

/// An observer list with queued, non-reentrant emission.
pub struct Signal<T: Clone + Send + 'static> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// A signal with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe; the returned receiver yields every value emitted from
    /// now on. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn connect(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().expect("signal lock").push(tx);
        rx
    }

    /// Queue `value` to every live subscriber. Never invokes a listener
    /// inline.
    pub fn emit(&self, value: T) {
        let mut subscribers = self.subscribers.lock().expect("signal lock");
        subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().expect("signal lock");
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_every_subscriber() {
        let signal = Signal::new();
        let mut a = signal.connect();
        let mut b = signal.connect();

        signal.emit(7u32);
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_emission_is_deferred() {
        let signal = Signal::new();
        let mut rx = signal.connect();

        signal.emit("queued".to_string());
        signal.emit("both".to_string());
        // Nothing was invoked inline; both values wait in the queue
        assert_eq!(rx.recv().await.as_deref(), Some("queued"));
        assert_eq!(rx.recv().await.as_deref(), Some("both"));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let signal = Signal::new();
        let rx = signal.connect();
        let _keep = signal.connect();
        assert_eq!(signal.subscriber_count(), 2);

        drop(rx);
        signal.emit(1u8);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let signal: Signal<u32> = Signal::new();
        signal.emit(1);
    }
}
