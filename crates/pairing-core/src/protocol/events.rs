//! Events produced by the messaging backend.
//!
//! The backend client delivers two independent event streams:
//!
//! - [`SessionEvent`] – lifecycle events of the device session, delivered to a
//!   single registered handler.
//! - [`PairingEvent`] – the items of a pairing stream opened while no device
//!   identity is stored.

/// A lifecycle event from the messaging backend.
///
/// The enum is `#[non_exhaustive]`: code outside this crate must include a
/// wildcard arm when matching, so new backend event kinds are handled
/// explicitly (at least logged) instead of breaking the build or being
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionEvent {
    /// An incoming chat message.
    Message {
        /// Sender address as reported by the backend.
        sender: String,
        /// Plain-text body (empty for media messages).
        text: String,
    },
    /// The device session is up.
    Connected,
    /// The device session dropped.
    Disconnected,
}

impl SessionEvent {
    /// Returns a short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// One item of a pairing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A new pairing code to present to the user.
    Code(String),
    /// The code was scanned and the device is now linked.
    Success,
    /// No code was scanned before the backend gave up.
    Timeout,
    /// The backend reported a pairing failure.
    Error(String),
}

impl PairingEvent {
    /// Builds an event from the backend's `(event name, code)` pair.
    ///
    /// `"code"` carries the code, `"success"` and `"timeout"` are terminal
    /// outcomes, and any other name is reported as an error with the name
    /// preserved.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pairing_core::PairingEvent;
    ///
    /// assert_eq!(PairingEvent::from_raw("code", "2@xyz"), PairingEvent::Code("2@xyz".into()));
    /// assert_eq!(PairingEvent::from_raw("success", ""), PairingEvent::Success);
    /// ```
    pub fn from_raw(event: &str, code: &str) -> Self {
        match event {
            "code" => Self::Code(code.to_string()),
            "success" => Self::Success,
            "timeout" => Self::Timeout,
            other => Self::Error(other.to_string()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_code_keeps_payload() {
        assert_eq!(
            PairingEvent::from_raw("code", "Q1"),
            PairingEvent::Code("Q1".to_string())
        );
    }

    #[test]
    fn test_from_raw_unknown_event_is_error() {
        assert_eq!(
            PairingEvent::from_raw("err-client-outdated", ""),
            PairingEvent::Error("err-client-outdated".to_string())
        );
    }

    #[test]
    fn test_session_event_kind_labels() {
        let msg = SessionEvent::Message {
            sender: "123@s.whatsapp.net".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(msg.kind(), "message");
        assert_eq!(SessionEvent::Connected.kind(), "connected");
        assert_eq!(SessionEvent::Disconnected.kind(), "disconnected");
    }
}
