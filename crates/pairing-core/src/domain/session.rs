//! Session state: the latest pairing code and the connected flag.
//!
//! # Why a single lock? (for beginners)
//!
//! The two fields are read together: a subscriber that joins needs *both*
//! "is the session up?" and "which code should I show?".  If each field had
//! its own lock, a disconnect (which flips the flag **and** clears the code)
//! could interleave with a reader so that it sees the new flag next to the
//! old code.  Guarding both fields with one [`parking_lot::Mutex`] makes
//! every mutation and every [`StateStore::snapshot`] a single indivisible
//! step.
//!
//! `parking_lot::Mutex` is used instead of `std::sync::Mutex` because it
//! never poisons: a panic in one caller cannot make the process-wide state
//! unreadable for everyone else.

use parking_lot::Mutex;

use crate::domain::status::ConnectionStatus;
use crate::protocol::messages::OutboundMessage;

/// A consistent view of the session at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// The most recent pairing code, or an empty string when none is pending.
    pub latest_pairing_code: String,
    /// Whether the device session is currently established.
    pub is_connected: bool,
}

impl SessionState {
    /// Returns `true` if a pairing code is stored.
    pub fn has_pairing_code(&self) -> bool {
        !self.latest_pairing_code.is_empty()
    }

    /// Returns the single message a newly joined subscriber should receive.
    ///
    /// Status takes precedence over a stored code: once connected, any code
    /// still held is stale and must not be offered for scanning.
    ///
    /// | `is_connected` | code stored | initial message                  |
    /// |----------------|-------------|----------------------------------|
    /// | `true`         | any         | status "WhatsApp already connected!" |
    /// | `false`        | yes         | `qr` with the stored code        |
    /// | `false`        | no          | none                             |
    pub fn initial_message(&self) -> Option<OutboundMessage> {
        if self.is_connected {
            Some(OutboundMessage::status(&ConnectionStatus::AlreadyConnected))
        } else if self.has_pairing_code() {
            Some(OutboundMessage::qr(self.latest_pairing_code.clone()))
        } else {
            None
        }
    }
}

/// Process-wide holder of the [`SessionState`].
///
/// Every method takes the internal lock exactly once, so each call is atomic
/// with respect to all other calls.  The store is created once by the entry
/// point and shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: Mutex<SessionState>,
}

impl StateStore {
    /// Creates an empty store: no pairing code, not connected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `code` as the latest pairing code.
    pub fn set_pairing_code(&self, code: impl Into<String>) {
        self.inner.lock().latest_pairing_code = code.into();
    }

    /// Sets the connected flag without touching the pairing code.
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().is_connected = connected;
    }

    /// Forgets the stored pairing code.
    pub fn clear_pairing_code(&self) {
        self.inner.lock().latest_pairing_code.clear();
    }

    /// Returns a copy of both fields taken under one lock.
    pub fn snapshot(&self) -> SessionState {
        self.inner.lock().clone()
    }

    /// Records a freshly issued pairing code.
    ///
    /// A new code means the previous session is gone, so the connected flag
    /// is reset in the same critical section.
    pub fn begin_pairing(&self, code: impl Into<String>) {
        let mut state = self.inner.lock();
        state.latest_pairing_code = code.into();
        state.is_connected = false;
    }

    /// Applies a status change and returns the resulting state.
    ///
    /// The flag becomes [`ConnectionStatus::is_connected`]; a disconnect
    /// additionally clears the pairing code under the same lock so no reader
    /// can observe `connected = false` next to a dead code.
    pub fn apply_status(&self, status: &ConnectionStatus) -> SessionState {
        let mut state = self.inner.lock();
        state.is_connected = status.is_connected();
        if status.clears_pairing_code() {
            state.latest_pairing_code.clear();
        }
        state.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
