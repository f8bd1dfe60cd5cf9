//! # Event Bus
//!
//! A typed fanout of sync-lifecycle events, replacing stringly-typed topics
//! ("sync://status", "sync://progress") with a closed enum a subscriber can
//! exhaustively match on.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// A sync-lifecycle event. Consumers (a UI layer, a test harness) turn
/// these into whatever presentation they need; this crate makes no
/// assumption about how they're displayed.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The network probe transitioned to reachable.
    Online,
    /// The network probe transitioned to unreachable.
    Offline,
    /// A sync pass began.
    SyncStarted,
    /// A sync pass finished; counts are items successfully replayed and
    /// items left pending (including newly WAITING/backed-off items).
    SyncComplete { succeeded: usize, remaining: usize },
    /// An outbox item exhausted its retries and was marked `Failed`.
    ItemFailedPermanently { outbox_id: String, reason: String },
}

/// A broadcast-style event bus. Each [`subscribe`](EventBus::subscribe)
/// call creates a new receiver that sees all events published after the
/// subscription was created. Disconnected subscribers are pruned lazily on
/// publish.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<mpsc::UnboundedSender<SyncEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.push(tx);
        rx
    }

    pub fn publish(&self, event: SyncEvent) {
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("EventBus lock poisoned").len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(SyncEvent::Online);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, SyncEvent::Online);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_on_publish() {
        let bus = EventBus::new();
        {
            let _rx = bus.subscribe();
            assert_eq!(bus.subscriber_count(), 1);
        }
        bus.publish(SyncEvent::Offline);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
