//! Application layer for the gateway.
//!
//! Contains the use-cases that tie session events to subscribers:
//!
//! - [`registry`]: the live set of subscribers.
//! - [`broadcaster`]: commit-then-fan-out of pairing codes and statuses.
//! - [`event_adapter`]: maps backend session events to broadcasts.
//! - [`reconnect`]: the pairing / re-pairing state machine.
//!
//! # What does NOT belong here?
//!
//! - Socket handling or frame encoding (that is `infrastructure::ws_server`)
//! - File I/O (that is `infrastructure::storage`)

pub mod broadcaster;
pub mod event_adapter;
pub mod reconnect;
pub mod registry;

pub use broadcaster::Broadcaster;
pub use event_adapter::SessionEventAdapter;
pub use reconnect::{OrchestratorHandle, OrchestratorState, ReconnectOrchestrator};
pub use registry::{DeliveryError, Subscriber, SubscriberId, SubscriberRegistry};
