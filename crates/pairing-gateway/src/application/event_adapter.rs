//! Session event adapter: the one callback registered with the backend client.
//!
//! Maps each [`SessionEvent`] to broadcaster calls.  Handling is
//! non-blocking: broadcasts only enqueue, and re-pairing after a disconnect
//! is handed to the [`ReconnectOrchestrator`](crate::application::reconnect::ReconnectOrchestrator)
//! task through its handle instead of being run inside the callback.

use std::sync::Arc;

use tracing::{debug, info};

use pairing_core::{ConnectionStatus, SessionEvent};

use crate::application::broadcaster::Broadcaster;
use crate::application::reconnect::OrchestratorHandle;
use crate::infrastructure::session_client::EventHandler;

/// Dispatches backend session events.
#[derive(Debug, Clone)]
pub struct SessionEventAdapter {
    broadcaster: Arc<Broadcaster>,
    reconnect: OrchestratorHandle,
}

impl SessionEventAdapter {
    pub fn new(broadcaster: Arc<Broadcaster>, reconnect: OrchestratorHandle) -> Self {
        Self {
            broadcaster,
            reconnect,
        }
    }

    /// Handles one event.
    pub fn handle(&self, event: SessionEvent) {
        match event {
            SessionEvent::Message { sender, text } => {
                // Acknowledged in the log only; messages are never broadcast.
                info!("received message from {sender}: {text}");
            }
            SessionEvent::Connected => {
                self.broadcaster.broadcast_status(ConnectionStatus::Connected);
            }
            SessionEvent::Disconnected => {
                self.broadcaster
                    .broadcast_status(ConnectionStatus::Disconnected);
                if self.reconnect.request_reconnect() {
                    info!("session disconnected; reconnection scheduled");
                }
            }
            other => {
                debug!("ignoring unhandled session event: {}", other.kind());
            }
        }
    }

    /// Wraps the adapter into the boxed callback a
    /// [`SessionClient`](crate::infrastructure::session_client::SessionClient)
    /// accepts.
    pub fn into_handler(self) -> EventHandler {
        Box::new(move |event| self.handle(event))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
