//! Subscriber registry: the live set of real-time clients.
//!
//! A [`Subscriber`] is an identity plus the sending half of a bounded
//! outbound queue.  The infrastructure layer owns the receiving half and
//! drains it into the subscriber's WebSocket.  Dropping the last
//! `Subscriber` handle closes the queue, which the writer task observes as
//! "transport released" and answers with a Close frame.
//!
//! # Concurrency
//!
//! The map sits behind a `parking_lot::RwLock`.  Broadcasts only take a
//! short read lock to copy the current handles ([`SubscriberRegistry::snapshot`]),
//! then deliver without holding it, so `add`/`remove` calls from session
//! tasks never wait on a fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use pairing_core::OutboundMessage;

/// Unique identity of a subscriber for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Generates a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first UUID group is plenty to tell subscribers apart in logs.
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}

/// Why a message could not be queued for a subscriber.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The outbound queue is full: the subscriber is not keeping up.
    #[error("outbound queue is full")]
    QueueFull,

    /// The receiving side is gone: the transport already closed.
    #[error("subscriber transport is closed")]
    Closed,
}

/// Handle to one connected subscriber.
///
/// Cloning is cheap (an `Arc` and a channel sender) and is how the
/// broadcaster takes a stable snapshot of the live set.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    label: Arc<str>,
    tx: mpsc::Sender<OutboundMessage>,
}

impl Subscriber {
    /// Creates a subscriber with a fresh identity and a queue of `capacity`
    /// messages, returning the handle and the queue's receiving half.
    ///
    /// `label` only appears in log lines (typically the peer address).
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a `tokio::sync::mpsc` requirement).
    pub fn channel(
        label: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let subscriber = Self {
            id: SubscriberId::new(),
            label: Arc::from(label.into()),
            tx,
        };
        (subscriber, rx)
    }

    /// Returns this subscriber's identity.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Returns the log label given at creation.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queues `message` without waiting.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::QueueFull`] when the subscriber is behind by a whole
    /// queue, [`DeliveryError::Closed`] when its transport is gone.
    pub fn try_deliver(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Returns `true` once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The set of live subscribers, keyed by identity.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `subscriber`.
    ///
    /// Returns `false` and leaves the registry unchanged if a subscriber with
    /// the same identity is already registered, so no entry is ever
    /// duplicated or silently replaced.
    pub fn add(&self, subscriber: Subscriber) -> bool {
        let mut subscribers = self.subscribers.write();
        if subscribers.contains_key(&subscriber.id) {
            return false;
        }
        subscribers.insert(subscriber.id, subscriber);
        true
    }

    /// Removes and returns the subscriber with `id`.
    ///
    /// Removing an unknown or already-removed subscriber is a no-op that
    /// returns `None`.  Dropping the returned handle releases the transport.
    pub fn remove(&self, id: SubscriberId) -> Option<Subscriber> {
        self.subscribers.write().remove(&id)
    }

    /// Returns `true` if `id` is currently registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the current handles so a fan-out can iterate them without
    /// holding the registry lock.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Removes every subscriber and returns them.  Used at shutdown.
    pub fn drain(&self) -> Vec<Subscriber> {
        self.subscribers.write().drain().map(|(_, s)| s).collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pairing_core::ConnectionStatus;

    fn make_subscriber() -> (Subscriber, mpsc::Receiver<OutboundMessage>) {
        Subscriber::channel("test", 4)
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_add_registers_subscriber() {
        // Arrange
        let registry = SubscriberRegistry::new();
        let (sub, _rx) = make_subscriber();
        let id = sub.id();

        // Act
        let added = registry.add(sub);

        // Assert
        assert!(added);
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_same_identity_twice_is_rejected() {
        let registry = SubscriberRegistry::new();
        let (sub, _rx) = make_subscriber();

        assert!(registry.add(sub.clone()));
        assert!(!registry.add(sub));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_returns_subscriber_once() {
        // Arrange
        let registry = SubscriberRegistry::new();
        let (sub, _rx) = make_subscriber();
        let id = sub.id();
        registry.add(sub);

        // Act
        let first = registry.remove(id);
        let second = registry.remove(id);

        // Assert: second removal is a no-op, not an error
        assert!(first.is_some());
        assert!(second.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let registry = SubscriberRegistry::new();
        assert!(registry.remove(SubscriberId::new()).is_none());
    }

    #[test]
    fn test_removing_last_handle_closes_queue() {
        let registry = SubscriberRegistry::new();
        let (sub, mut rx) = make_subscriber();
        let id = sub.id();
        registry.add(sub);

        drop(registry.remove(id));

        // The sender is gone, so the receiver reports end-of-stream.
        assert!(rx.try_recv().is_err());
        assert!(rx.is_closed());
    }

    #[test]
    fn test_drain_empties_registry() {
        let registry = SubscriberRegistry::new();
        let (a, _ra) = make_subscriber();
        let (b, _rb) = make_subscriber();
        registry.add(a);
        registry.add(b);

        let drained = registry.drain();

        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }

    // ── Subscriber delivery ───────────────────────────────────────────────────

    #[test]
    fn test_try_deliver_queues_message() {
        let (sub, mut rx) = make_subscriber();
        sub.try_deliver(OutboundMessage::qr("Q1")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::qr("Q1"));
    }

    #[test]
    fn test_try_deliver_reports_full_queue() {
        // Arrange: capacity 1, nothing drained
        let (sub, _rx) = Subscriber::channel("slow", 1);
        sub.try_deliver(OutboundMessage::qr("Q1")).unwrap();

        // Act
        let result = sub.try_deliver(OutboundMessage::qr("Q2"));

        // Assert
        assert_eq!(result, Err(DeliveryError::QueueFull));
    }

    #[test]
    fn test_try_deliver_reports_closed_transport() {
        let (sub, rx) = make_subscriber();
        drop(rx);

        let result = sub.try_deliver(OutboundMessage::status(&ConnectionStatus::Connected));

        assert_eq!(result, Err(DeliveryError::Closed));
        assert!(sub.is_closed());
    }

    #[test]
    fn test_subscriber_ids_are_unique() {
        let (a, _ra) = make_subscriber();
        let (b, _rb) = make_subscriber();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_subscriber_id_display_is_short() {
        assert_eq!(SubscriberId::new().to_string().len(), 8);
    }
}
