//! Scriptable session client for tests.
//!
//! Lets tests drive the orchestrator and event adapter without a messaging
//! backend: push pairing events into the most recently opened stream, fire
//! session events through the installed handler, and count the calls the
//! gateway made.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use pairing_core::{PairingEvent, SessionEvent};

use super::{EventHandler, PairingStream, SessionClient, SessionClientError};

/// Capacity of each pairing stream opened by the mock.
const STREAM_CAPACITY: usize = 16;

/// A [`SessionClient`] whose behaviour is controlled by the test.
#[derive(Default)]
pub struct MockSessionClient {
    handler: Mutex<Option<Arc<EventHandler>>>,
    pairing_tx: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    stored_identity: AtomicBool,
    fail_connect: AtomicBool,
    fail_pairing_stream: AtomicBool,
    drop_on_connect: AtomicBool,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    clear_calls: AtomicU32,
    streams_opened: AtomicU32,
}

impl MockSessionClient {
    /// Creates a mock with no stored identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that reports a stored identity, as after an earlier
    /// successful pairing.
    pub fn with_stored_identity() -> Self {
        let mock = Self::new();
        mock.stored_identity.store(true, Ordering::SeqCst);
        mock
    }

    /// Makes every subsequent `connect()` fail (or succeed again).
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `open_pairing_stream()` fail (or succeed again).
    pub fn set_fail_pairing_stream(&self, fail: bool) {
        self.fail_pairing_stream.store(fail, Ordering::SeqCst);
    }

    /// Makes the next successful `connect()` report `Disconnected` through
    /// the handler before it returns, as a backend that drops the session
    /// mid-handshake would.
    pub fn set_drop_on_connect(&self, enabled: bool) {
        self.drop_on_connect.store(enabled, Ordering::SeqCst);
    }

    /// Delivers `event` through the installed handler, as the backend would.
    ///
    /// Returns `false` if no handler has been installed.
    pub fn emit(&self, event: SessionEvent) -> bool {
        // Clone the handler out so it runs without the lock held.
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    /// Pushes `event` into the most recently opened pairing stream.
    ///
    /// Returns `false` if no stream is open or its receiver was dropped.
    pub async fn push_pairing(&self, event: PairingEvent) -> bool {
        let tx = self.pairing_tx.lock().clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Drops the sending half of the current pairing stream.
    pub fn close_pairing_stream(&self) {
        *self.pairing_tx.lock() = None;
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> u32 {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> u32 {
        self.streams_opened.load(Ordering::SeqCst)
    }

    /// Polls until `connect()` has been called at least `n` times.
    ///
    /// Returns `false` if that does not happen within `limit`.
    pub async fn wait_for_connects(&self, n: u32, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while self.connect_calls() < n {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

#[async_trait]
impl SessionClient for MockSessionClient {
    fn set_event_handler(&self, handler: EventHandler) {
        *self.handler.lock() = Some(Arc::new(handler));
    }

    async fn open_pairing_stream(&self) -> Result<PairingStream, SessionClientError> {
        if self.fail_pairing_stream.load(Ordering::SeqCst) {
            return Err(SessionClientError::PairingStream(
                "mock pairing stream failure".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        *self.pairing_tx.lock() = Some(tx);
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    async fn connect(&self) -> Result<(), SessionClientError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(SessionClientError::Connect("mock connect failure".to_string()));
        }
        if self.drop_on_connect.swap(false, Ordering::SeqCst) {
            self.emit(SessionEvent::Disconnected);
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn has_stored_identity(&self) -> bool {
        self.stored_identity.load(Ordering::SeqCst)
    }

    async fn clear_stored_identity(&self) -> Result<(), SessionClientError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.stored_identity.store(false, Ordering::SeqCst);
        Ok(())
    }
}
