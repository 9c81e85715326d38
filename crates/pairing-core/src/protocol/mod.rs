//! Protocol types for the pairing gateway.
//!
//! - [`messages`] – JSON messages pushed to subscribers.
//! - [`events`]   – Typed events produced by the messaging backend.

pub mod events;
pub mod messages;

pub use events::{PairingEvent, SessionEvent};
pub use messages::OutboundMessage;
