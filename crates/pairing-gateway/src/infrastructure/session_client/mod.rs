//! Messaging backend client abstraction.
//!
//! The gateway never talks to the messaging network directly.  Everything it
//! needs from the backend is captured by the [`SessionClient`] trait:
//!
//! - a callback for asynchronous session events (messages, connect,
//!   disconnect),
//! - a pairing stream that yields codes until the phone scans one,
//! - connect / disconnect,
//! - access to the stored device identity.
//!
//! # Implementations
//!
//! | Type                                   | Used by                         |
//! |----------------------------------------|---------------------------------|
//! | [`simulated::SimulatedSessionClient`]  | the `pairing-gateway` binary    |
//! | [`mock::MockSessionClient`]            | unit and integration tests      |
//!
//! # Pairing stream contract
//!
//! [`SessionClient::open_pairing_stream`] must be called *before*
//! [`SessionClient::connect`] when no identity is stored.  The stream then
//! yields zero or more [`PairingEvent::Code`]s followed by one terminal
//! event, after which the sender is dropped.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use pairing_core::{PairingEvent, SessionEvent};

use crate::infrastructure::storage::StorageError;

pub mod mock;
pub mod simulated;

/// Callback invoked by the client for every [`SessionEvent`].
///
/// Called from the client's own task; it must not block.
pub type EventHandler = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// Receiving half of a pairing stream.
pub type PairingStream = mpsc::Receiver<PairingEvent>;

/// Error type for backend client operations.
#[derive(Debug, Error)]
pub enum SessionClientError {
    /// Connecting to the backend failed.
    #[error("failed to connect to messaging backend: {0}")]
    Connect(String),

    /// The pairing stream could not be opened.
    #[error("failed to open pairing stream: {0}")]
    PairingStream(String),

    /// Reading or writing the stored identity failed.
    #[error("identity storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A linked-device session with the messaging backend.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Installs the callback that receives asynchronous session events,
    /// replacing any previous one.
    fn set_event_handler(&self, handler: EventHandler);

    /// Opens a fresh pairing stream.
    ///
    /// # Errors
    ///
    /// Returns [`SessionClientError::PairingStream`] if the backend cannot
    /// start a pairing attempt.
    async fn open_pairing_stream(&self) -> Result<PairingStream, SessionClientError>;

    /// Connects to the backend, either with the stored identity or, when none
    /// exists, by starting the pairing attempt on the open stream.
    ///
    /// # Errors
    ///
    /// Returns [`SessionClientError::Connect`] if the connection attempt fails.
    async fn connect(&self) -> Result<(), SessionClientError>;

    /// Disconnects from the backend.  Safe to call when not connected.
    async fn disconnect(&self);

    /// Returns `true` if a device identity from an earlier pairing is stored.
    fn has_stored_identity(&self) -> bool;

    /// Deletes the stored identity so the next connect requires pairing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionClientError::Storage`] if the identity cannot be
    /// removed.
    async fn clear_stored_identity(&self) -> Result<(), SessionClientError>;
}
