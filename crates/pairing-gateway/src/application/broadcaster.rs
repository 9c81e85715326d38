//! Broadcaster: commits session changes and fans them out to subscribers.
//!
//! # One serialization point
//!
//! Every operation that touches subscribers' outbound queues runs under the
//! `publish` lock:
//!
//! - [`Broadcaster::broadcast_pairing_code`] / [`Broadcaster::broadcast_status`]
//!   commit to the [`StateStore`] and enqueue to every subscriber.
//! - [`Broadcaster::add_subscriber`] reads the snapshot, registers the
//!   subscriber, and enqueues its initial message.
//!
//! Because enqueueing never waits (bounded queue + `try_send`), the lock is
//! held only for a few pointer pushes.  In exchange each subscriber sees
//! events in exactly the order they were issued, and a joining subscriber
//! can neither miss a change that landed between its snapshot and its
//! registration nor receive a snapshot older than an event already queued
//! for it.
//!
//! Removal does not take the `publish` lock; the registry's own lock keeps
//! the live set consistent while a fan-out is in flight.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use pairing_core::{ConnectionStatus, OutboundMessage, SessionState, StateStore};

use crate::application::registry::{Subscriber, SubscriberId, SubscriberRegistry};

/// Fan-out engine over a [`StateStore`] and a [`SubscriberRegistry`].
///
/// Shared behind an `Arc` by the WebSocket sessions, the event adapter, and
/// the reconnection orchestrator.  No method blocks on I/O and no method
/// returns an error: delivery failures are absorbed here by dropping the
/// failing subscriber.
#[derive(Debug)]
pub struct Broadcaster {
    state: Arc<StateStore>,
    registry: SubscriberRegistry,
    publish: Mutex<()>,
}

impl Broadcaster {
    /// Creates a broadcaster over an existing state store.
    pub fn new(state: Arc<StateStore>) -> Self {
        Self {
            state,
            registry: SubscriberRegistry::new(),
            publish: Mutex::new(()),
        }
    }

    /// Returns a consistent copy of the session state.
    pub fn snapshot(&self) -> SessionState {
        self.state.snapshot()
    }

    /// Read access to the live subscriber set.
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Registers `subscriber` and queues its initial snapshot message.
    ///
    /// The initial message follows [`SessionState::initial_message`]: the
    /// "already connected" status when the session is up, otherwise the
    /// pending pairing code, otherwise nothing.
    ///
    /// Returns `false` if the subscriber was not left registered: either its
    /// identity was already present, or its transport failed before the
    /// initial message could be queued.
    pub fn add_subscriber(&self, subscriber: Subscriber) -> bool {
        let id = subscriber.id();
        let _publish = self.publish.lock();

        let snapshot = self.state.snapshot();
        if !self.registry.add(subscriber.clone()) {
            warn!(subscriber = %id, "subscriber already registered; ignoring duplicate add");
            return false;
        }

        if let Some(initial) = snapshot.initial_message() {
            if let Err(e) = subscriber.try_deliver(initial) {
                warn!(subscriber = %id, error = %e, "initial snapshot delivery failed; dropping subscriber");
                self.registry.remove(id);
                return false;
            }
        }

        info!(
            subscriber = %id,
            peer = subscriber.label(),
            total = self.registry.len(),
            "subscriber added"
        );
        true
    }

    /// Removes the subscriber with `id`, releasing its transport.
    ///
    /// Returns `true` if it was registered.  Calling this for a subscriber
    /// that is already gone is a no-op.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        match self.registry.remove(id) {
            Some(subscriber) => {
                info!(
                    subscriber = %id,
                    peer = subscriber.label(),
                    total = self.registry.len(),
                    "subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    /// Stores a new pairing code and pushes it to every subscriber.
    ///
    /// A new code means the previous session is void, so the connected flag
    /// is reset in the same state-store update.  Returns the number of
    /// subscribers the code was queued for.
    pub fn broadcast_pairing_code(&self, code: impl Into<String>) -> usize {
        let code = code.into();
        let _publish = self.publish.lock();
        self.state.begin_pairing(code.clone());
        self.fan_out(OutboundMessage::qr(code))
    }

    /// Stores a connection status and pushes it to every subscriber.
    ///
    /// Connected statuses set the flag; a disconnect clears the flag *and*
    /// the stored pairing code; any other status clears the flag only.
    /// Returns the number of subscribers the status was queued for.
    pub fn broadcast_status(&self, status: ConnectionStatus) -> usize {
        let _publish = self.publish.lock();
        let state = self.state.apply_status(&status);
        debug!(status = %status, connected = state.is_connected, "session status committed");
        self.fan_out(OutboundMessage::status(&status))
    }

    /// Removes every subscriber, closing their transports.  Returns how many
    /// were removed.
    pub fn close_all(&self) -> usize {
        let _publish = self.publish.lock();
        let drained = self.registry.drain();
        let count = drained.len();
        drop(drained);
        if count > 0 {
            info!(count, "closed all subscribers");
        }
        count
    }

    /// Queues `message` for a stable snapshot of the live set and drops every
    /// subscriber whose queue rejected it.  Caller must hold `publish`.
    fn fan_out(&self, message: OutboundMessage) -> usize {
        let recipients = self.registry.snapshot();
        let mut delivered = 0;
        let mut failed = Vec::new();

        for subscriber in &recipients {
            match subscriber.try_deliver(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        subscriber = %subscriber.id(),
                        peer = subscriber.label(),
                        kind = message.kind(),
                        error = %e,
                        "delivery failed; dropping subscriber"
                    );
                    failed.push(subscriber.id());
                }
            }
        }

        for id in failed {
            self.registry.remove(id);
        }

        debug!(
            kind = message.kind(),
            recipients = recipients.len(),
            delivered,
            "broadcast"
        );
        delivered
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(Arc::new(StateStore::new()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
