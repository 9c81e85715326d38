//! Connection status vocabulary shared by the gateway and its subscribers.
//!
//! Browsers display the status text verbatim, so the three well-known
//! strings below are part of the wire contract and must never change.
//! Matching is exact: `"WhatsApp connected successfully"` (missing `!`) is
//! *not* a connected status.

use std::fmt;

/// Text pushed when a fresh pairing completed.
pub const STATUS_CONNECTED: &str = "WhatsApp connected successfully!";

/// Text pushed when a stored identity was reused, and to every subscriber
/// that joins while the session is up.
pub const STATUS_ALREADY_CONNECTED: &str = "WhatsApp already connected!";

/// Text pushed when the session dropped.
pub const STATUS_DISCONNECTED: &str = "WhatsApp disconnected";

/// A connection status as carried in a `{"type":"status"}` message.
///
/// The enum is closed over the three statuses the gateway itself produces,
/// with [`ConnectionStatus::Other`] preserving any unrecognised text so it
/// can still be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// A new pairing just succeeded.
    Connected,
    /// The session was already established (stored identity).
    AlreadyConnected,
    /// The session dropped; the stored pairing code is no longer valid.
    Disconnected,
    /// Any other status text.  Treated as "not connected".
    Other(String),
}

impl ConnectionStatus {
    /// Parses a status string using exact matching.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pairing_core::ConnectionStatus;
    ///
    /// assert_eq!(
    ///     ConnectionStatus::from_wire("WhatsApp disconnected"),
    ///     ConnectionStatus::Disconnected
    /// );
    /// assert!(!ConnectionStatus::from_wire("connected").is_connected());
    /// ```
    pub fn from_wire(text: &str) -> Self {
        match text {
            STATUS_CONNECTED => Self::Connected,
            STATUS_ALREADY_CONNECTED => Self::AlreadyConnected,
            STATUS_DISCONNECTED => Self::Disconnected,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the exact text sent to subscribers.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => STATUS_CONNECTED,
            Self::AlreadyConnected => STATUS_ALREADY_CONNECTED,
            Self::Disconnected => STATUS_DISCONNECTED,
            Self::Other(text) => text,
        }
    }

    /// Returns the value of the connected flag this status implies.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::AlreadyConnected)
    }

    /// Returns `true` if this status invalidates the stored pairing code.
    pub fn clears_pairing_code(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ConnectionStatus {
    fn from(text: &str) -> Self {
        Self::from_wire(text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
