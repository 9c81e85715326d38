//! JSON messages pushed from the gateway to subscribers.
//!
//! Every message is a JSON object with a `"type"` discriminant and exactly
//! one payload field:
//!
//! ```text
//! {"type": "qr",     "code":   "<opaque pairing string>"}
//! {"type": "status", "status": "<status text>"}
//! ```
//!
//! The server never expects anything back; inbound frames are only watched
//! to notice that the subscriber went away.

use serde::{Deserialize, Serialize};

use crate::domain::status::ConnectionStatus;

/// A message sent from the gateway to a subscriber.
///
/// # Serialization format
///
/// `#[serde(tag = "type")]` stores the variant name in a `"type"` field, and
/// `rename_all = "lowercase"` turns `Qr` into `"qr"` and `Status` into
/// `"status"`, matching what the browser page switches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// A new pairing code to render as a QR code.
    Qr {
        /// Opaque pairing payload.
        code: String,
    },

    /// A connection status change.
    Status {
        /// Exact status text (see [`ConnectionStatus::as_str`]).
        status: String,
    },
}

impl OutboundMessage {
    /// Builds a `qr` message.
    pub fn qr(code: impl Into<String>) -> Self {
        Self::Qr { code: code.into() }
    }

    /// Builds a `status` message carrying the status's exact wire text.
    pub fn status(status: &ConnectionStatus) -> Self {
        Self::Status {
            status: status.as_str().to_string(),
        }
    }

    /// Serializes the message to its JSON text-frame form.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error; with the current variants
    /// (strings only) serialization cannot fail in practice.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a message from JSON.  Used by subscribers and tests.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not one of the two message shapes.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns a short label for log lines that must not echo pairing codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Qr { .. } => "qr",
            Self::Status { .. } => "status",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
