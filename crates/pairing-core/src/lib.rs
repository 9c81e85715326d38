//! # pairing-core
//!
//! Shared library for the pairing gateway containing the session state model,
//! the connection-status vocabulary, and the JSON messages pushed to
//! real-time subscribers.
//!
//! It has zero dependencies on sockets, async runtimes, or the messaging
//! backend itself.
//!
//! # Architecture overview (for beginners)
//!
//! The gateway sits between one external messaging device session and any
//! number of browser tabs watching it.  The device is linked by scanning a
//! short-lived *pairing code* (shown as a QR code); afterwards the session is
//! either connected or disconnected.
//!
//! This crate (`pairing-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – The authoritative session view: the latest pairing code
//!   and the connected flag, guarded together so no reader ever sees a torn
//!   pair.  Also the closed set of status strings understood on the wire.
//!
//! - **`protocol`** – What travels: the outbound JSON messages subscribers
//!   receive, and the typed events the messaging backend produces.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pairing_core::StateStore` instead of `pairing_core::domain::session::StateStore`.
pub use domain::session::{SessionState, StateStore};
pub use domain::status::ConnectionStatus;
pub use protocol::events::{PairingEvent, SessionEvent};
pub use protocol::messages::OutboundMessage;
