//! Reconnection orchestrator: keeps the device session paired.
//!
//! # State machine
//!
//! ```text
//!            start, no identity                 Success
//!   Idle ───────────────────────► AwaitingPairing ─────────► Paired
//!    │  ▲                              ▲   │                   │
//!    │  └──── failure / Timeout ───────┼───┘                   │ Disconnected
//!    │                                 │                       ▼
//!    │  start, identity stored         └──── ReconnectPending ◄┘
//!    └──────────────────────────► Paired   (identity cleared)
//! ```
//!
//! All transitions happen on one long-lived task ([`ReconnectOrchestrator::run`]).
//! Other components only *ask* for a reconnection through an
//! [`OrchestratorHandle`]; the handle flips the state to `ReconnectPending`
//! and wakes the task.  A request arriving while a cycle is already pending
//! or in progress is ignored, so a burst of Disconnected events starts at
//! most one cycle.
//!
//! Transitions made after an `await` are compare-and-set.  A request that
//! lands while `connect()` or the pairing stream is pending is never
//! overwritten, and the success broadcast is skipped in its favour.
//!
//! # Failure policy
//!
//! A failed stream open, identity clear, or `connect()` is logged and the
//! cycle ends in `Idle`.  There is no automatic retry; the next Disconnected
//! event (or a restart) starts a fresh cycle.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use pairing_core::{ConnectionStatus, PairingEvent};

use crate::application::broadcaster::Broadcaster;
use crate::infrastructure::session_client::SessionClient;

/// Where the orchestrator currently is in its pairing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Not pairing and not known to be paired (startup, or after a failure).
    Idle,
    /// A pairing stream is open and codes are being broadcast.
    AwaitingPairing,
    /// The device session is established.
    Paired,
    /// A reconnection was requested and is about to start.
    ReconnectPending,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::AwaitingPairing => "awaiting-pairing",
            Self::Paired => "paired",
            Self::ReconnectPending => "reconnect-pending",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<OrchestratorState>,
    wake: Notify,
}

impl Shared {
    fn set(&self, next: OrchestratorState) {
        let mut state = self.state.lock();
        let previous = *state;
        if previous != next {
            debug!(from = %previous, to = %next, "orchestrator state change");
            *state = next;
        }
    }

    /// Moves `from` to `to` and runs `commit` while the state lock is held.
    ///
    /// Returns `false` without running `commit` if the state is no longer
    /// `from`, which happens when a reconnect request landed mid-flight.
    fn advance(
        &self,
        from: OrchestratorState,
        to: OrchestratorState,
        commit: impl FnOnce(),
    ) -> bool {
        let mut state = self.state.lock();
        let current = *state;
        if current != from {
            debug!(expected = %from, actual = %current, to = %to, "state moved on; transition skipped");
            return false;
        }
        if current != to {
            debug!(from = %current, to = %to, "orchestrator state change");
        }
        *state = to;
        commit();
        true
    }
}

/// Cheap, cloneable handle for observing the orchestrator and requesting a
/// reconnection.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    shared: Arc<Shared>,
}

impl OrchestratorHandle {
    /// Returns the current state.
    pub fn state(&self) -> OrchestratorState {
        *self.shared.state.lock()
    }

    /// Asks the orchestrator to force a fresh pairing.
    ///
    /// Accepted only from `Paired` or `Idle`; returns `false` (and does
    /// nothing) while a cycle is pending or in progress.  Never blocks.
    pub fn request_reconnect(&self) -> bool {
        let mut state = self.shared.state.lock();
        match *state {
            OrchestratorState::Paired | OrchestratorState::Idle => {
                *state = OrchestratorState::ReconnectPending;
                drop(state);
                self.shared.wake.notify_one();
                true
            }
            current @ (OrchestratorState::AwaitingPairing | OrchestratorState::ReconnectPending) => {
                debug!(state = %current, "reconnect already in progress; request ignored");
                false
            }
        }
    }
}

/// Drives pairing and re-pairing of the device session.
pub struct ReconnectOrchestrator {
    client: Arc<dyn SessionClient>,
    broadcaster: Arc<Broadcaster>,
    shared: Arc<Shared>,
}

impl ReconnectOrchestrator {
    pub fn new(client: Arc<dyn SessionClient>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            client,
            broadcaster,
            shared: Arc::new(Shared {
                state: Mutex::new(OrchestratorState::Idle),
                wake: Notify::new(),
            }),
        }
    }

    /// Returns a handle sharing this orchestrator's state.
    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the startup step and then serves reconnect requests until
    /// `shutdown` becomes `true` (or its sender is dropped).
    ///
    /// Shutdown stops consumption of any open pairing stream immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tokio::select! {
            _ = self.start() => {}
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("shutdown during startup; orchestrator stopping");
                return;
            }
        }

        loop {
            tokio::select! {
                _ = self.shared.wake.notified() => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }

            // A permit whose request was already superseded is stale.
            if *self.shared.state.lock() != OrchestratorState::ReconnectPending {
                continue;
            }

            tokio::select! {
                _ = self.reconnect() => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!("orchestrator stopped");
    }

    async fn start(&self) {
        if self.client.has_stored_identity() {
            info!("stored device identity found; resuming session");
            // `Idle` keeps accepting reconnect requests while this connects.
            match self.client.connect().await {
                Ok(()) => {
                    let resumed = self.shared.advance(
                        OrchestratorState::Idle,
                        OrchestratorState::Paired,
                        || {
                            self.broadcaster
                                .broadcast_status(ConnectionStatus::AlreadyConnected);
                        },
                    );
                    if !resumed {
                        warn!("session dropped while resuming; re-pairing");
                    }
                }
                Err(e) => error!("failed to resume stored session: {e}"),
            }
        } else {
            info!("no stored device identity; starting pairing");
            self.pair().await;
        }
    }

    async fn reconnect(&self) {
        info!("session lost; clearing identity and re-pairing");
        if let Err(e) = self.client.clear_stored_identity().await {
            error!("failed to clear stored identity; reconnection halted: {e}");
            self.shared.set(OrchestratorState::Idle);
            return;
        }
        self.pair().await;
    }

    /// Opens a pairing stream, connects, and relays the stream until it ends.
    async fn pair(&self) {
        self.shared.set(OrchestratorState::AwaitingPairing);

        let mut stream = match self.client.open_pairing_stream().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to open pairing stream; pairing halted: {e}");
                self.shared.set(OrchestratorState::Idle);
                return;
            }
        };

        if let Err(e) = self.client.connect().await {
            error!("connect failed; pairing halted: {e}");
            self.shared.set(OrchestratorState::Idle);
            return;
        }

        while let Some(event) = stream.recv().await {
            match event {
                PairingEvent::Code(code) => {
                    debug!("new pairing code issued");
                    self.broadcaster.broadcast_pairing_code(code);
                }
                PairingEvent::Success => {
                    info!("pairing succeeded");
                    self.shared.advance(
                        OrchestratorState::AwaitingPairing,
                        OrchestratorState::Paired,
                        || {
                            self.broadcaster.broadcast_status(ConnectionStatus::Connected);
                        },
                    );
                    return;
                }
                PairingEvent::Timeout => {
                    warn!("pairing timed out without a scan");
                    self.shared.set(OrchestratorState::Idle);
                    return;
                }
                PairingEvent::Error(reason) => {
                    warn!("pairing failed: {reason}");
                    self.shared.set(OrchestratorState::Idle);
                    return;
                }
            }
        }

        warn!("pairing stream closed before success");
        self.shared.set(OrchestratorState::Idle);
    }
}

/// Resolves once `shutdown` holds `true` or its sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
