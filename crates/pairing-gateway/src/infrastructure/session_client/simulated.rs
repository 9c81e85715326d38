//! Simulated messaging backend used by the `pairing-gateway` binary.
//!
//! Behaves like a linked-device backend from the gateway's point of view:
//!
//! - With a stored identity, `connect()` resumes the session immediately.
//! - Without one, `connect()` starts a pairing attempt on the open stream:
//!   a fresh code every `qr_interval`, then `Success` after `scan_after`
//!   codes (the identity is saved first), or `Timeout` once
//!   [`MAX_CODES`] codes went unscanned.
//! - With `drop_after` set, every established session is dropped after that
//!   long and reported as `Disconnected`.
//!
//! Outcomes are reported only through the pairing stream; the orchestrator
//! turns them into status broadcasts.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pairing_core::{PairingEvent, SessionEvent};

use super::{EventHandler, PairingStream, SessionClient, SessionClientError};
use crate::domain::GatewayConfig;
use crate::infrastructure::storage::IdentityStore;

/// Number of unscanned codes after which a pairing attempt times out.
pub const MAX_CODES: u32 = 6;

const STREAM_CAPACITY: usize = 8;

type HandlerSlot = Arc<Mutex<Option<Arc<EventHandler>>>>;

/// In-process stand-in for a real messaging backend.
pub struct SimulatedSessionClient {
    store: Arc<IdentityStore>,
    device_name: String,
    qr_interval: Duration,
    scan_after: Option<u32>,
    drop_after: Option<Duration>,
    handler: HandlerSlot,
    pending: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
}

impl SimulatedSessionClient {
    /// Creates a client over `store`, taking the device name and pairing
    /// timings from `config`.
    pub fn new(store: Arc<IdentityStore>, config: &GatewayConfig) -> Self {
        Self {
            store,
            device_name: format!("{} {}", config.app_name, config.app_version),
            qr_interval: config.qr_interval,
            scan_after: config.scan_after,
            drop_after: config.drop_after,
            handler: Arc::new(Mutex::new(None)),
            pending: Mutex::new(None),
            worker: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` while the simulated session is up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Drops the simulated session as if the backend had kicked the device,
    /// and reports it through the event handler.
    pub fn simulate_disconnect(&self) {
        self.stop_worker();
        drop_session(&self.connected, &self.handler);
    }

    fn spawn_worker(&self, work: impl Future<Output = ()> + Send + 'static) {
        let worker = tokio::spawn(work);
        if let Some(previous) = self.worker.lock().replace(worker) {
            previous.abort();
        }
    }

    fn stop_worker(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

#[async_trait]
impl SessionClient for SimulatedSessionClient {
    fn set_event_handler(&self, handler: EventHandler) {
        *self.handler.lock() = Some(Arc::new(handler));
    }

    async fn open_pairing_stream(&self) -> Result<PairingStream, SessionClientError> {
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        *self.pending.lock() = Some(tx);
        Ok(rx)
    }

    async fn connect(&self) -> Result<(), SessionClientError> {
        if self.store.has_identity() {
            self.connected.store(true, Ordering::SeqCst);
            info!("resumed stored device session");
            if let Some(after) = self.drop_after {
                let connected = Arc::clone(&self.connected);
                let handler = Arc::clone(&self.handler);
                self.spawn_worker(async move {
                    tokio::time::sleep(after).await;
                    drop_session(&connected, &handler);
                });
            }
            return Ok(());
        }

        let tx = self.pending.lock().take().ok_or_else(|| {
            SessionClientError::Connect(
                "no stored identity and no pairing stream open".to_string(),
            )
        })?;

        let attempt = PairingAttempt {
            tx,
            store: Arc::clone(&self.store),
            device_name: self.device_name.clone(),
            qr_interval: self.qr_interval,
            scan_after: self.scan_after,
            drop_after: self.drop_after,
            connected: Arc::clone(&self.connected),
            handler: Arc::clone(&self.handler),
        };
        self.spawn_worker(attempt.run());
        Ok(())
    }

    async fn disconnect(&self) {
        self.stop_worker();
        *self.pending.lock() = None;
        self.connected.store(false, Ordering::SeqCst);
        debug!("simulated backend disconnected");
    }

    fn has_stored_identity(&self) -> bool {
        self.store.has_identity()
    }

    async fn clear_stored_identity(&self) -> Result<(), SessionClientError> {
        self.store.clear()?;
        info!(path = %self.store.path().display(), "stored device identity cleared");
        Ok(())
    }
}

/// One pairing attempt, run on its own task.
struct PairingAttempt {
    tx: mpsc::Sender<PairingEvent>,
    store: Arc<IdentityStore>,
    device_name: String,
    qr_interval: Duration,
    scan_after: Option<u32>,
    drop_after: Option<Duration>,
    connected: Arc<AtomicBool>,
    handler: HandlerSlot,
}

impl PairingAttempt {
    async fn run(self) {
        let mut ticker = interval(self.qr_interval);
        let mut issued = 0u32;

        loop {
            ticker.tick().await;

            if self.scan_after.is_some_and(|n| issued >= n) {
                if self.complete().await {
                    if let Some(after) = self.drop_after {
                        tokio::time::sleep(after).await;
                        drop_session(&self.connected, &self.handler);
                    }
                }
                return;
            }
            if issued >= MAX_CODES {
                warn!(issued, "no pairing code was scanned");
                let _ = self.tx.send(PairingEvent::from_raw("timeout", "")).await;
                return;
            }

            let code = format!("2@{}", Uuid::new_v4().simple());
            issued += 1;
            if self.tx.send(PairingEvent::from_raw("code", &code)).await.is_err() {
                debug!("pairing stream receiver dropped; abandoning attempt");
                return;
            }
        }
    }

    /// Links the device and reports the outcome.  Returns `true` if the
    /// session is now up.
    async fn complete(&self) -> bool {
        let device_id = Uuid::new_v4().simple().to_string();
        let (outcome, linked) = match self.store.save(&device_id, &self.device_name) {
            Ok(()) => {
                self.connected.store(true, Ordering::SeqCst);
                info!(device_id = %device_id, "simulated scan accepted; device linked");
                (PairingEvent::Success, true)
            }
            Err(e) => (PairingEvent::Error(e.to_string()), false),
        };
        let _ = self.tx.send(outcome).await;
        linked
    }
}

/// Marks the session down and reports `Disconnected` if it was up.
fn drop_session(connected: &AtomicBool, handler: &HandlerSlot) {
    if connected.swap(false, Ordering::SeqCst) {
        info!("simulated backend dropped the session");
        let handler = handler.lock().clone();
        if let Some(handler) = handler {
            handler(SessionEvent::Disconnected);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tempfile::tempdir;

    fn make_client(dir: &tempfile::TempDir, scan_after: Option<u32>) -> SimulatedSessionClient {
        let store = Arc::new(IdentityStore::open(dir.path().join("session.toml")).unwrap());
        let config = GatewayConfig {
            qr_interval: Duration::from_millis(10),
            scan_after,
            ..GatewayConfig::default()
        };
        SimulatedSessionClient::new(store, &config)
    }

    #[tokio::test]
    async fn test_connect_without_stream_or_identity_fails() {
        let dir = tempdir().unwrap();
        let client = make_client(&dir, None);

        let result = client.connect().await;

        assert!(matches!(result, Err(SessionClientError::Connect(_))));
    }

    #[tokio::test]
    async fn test_pairing_issues_codes_then_success() {
        // Arrange
        let dir = tempdir().unwrap();
        let client = make_client(&dir, Some(2));
        let mut stream = client.open_pairing_stream().await.unwrap();

        // Act
        client.connect().await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }

        // Assert
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], PairingEvent::Code(c) if c.starts_with("2@")));
        assert!(matches!(&events[1], PairingEvent::Code(_)));
        assert_eq!(events[2], PairingEvent::Success);
        assert!(client.has_stored_identity());
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_unscanned_pairing_times_out() {
        let dir = tempdir().unwrap();
        let client = make_client(&dir, None);
        let mut stream = client.open_pairing_stream().await.unwrap();

        client.connect().await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), MAX_CODES as usize + 1);
        assert_eq!(events.last(), Some(&PairingEvent::Timeout));
        assert!(!client.has_stored_identity());
    }

    #[tokio::test]
    async fn test_connect_with_stored_identity_resumes() {
        let dir = tempdir().unwrap();
        let client = make_client(&dir, None);
        client.store.save("device-1", "test").unwrap();

        client.connect().await.unwrap();

        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_clear_stored_identity_forces_pairing() {
        let dir = tempdir().unwrap();
        let client = make_client(&dir, None);
        client.store.save("device-1", "test").unwrap();

        client.clear_stored_identity().await.unwrap();

        assert!(!client.has_stored_identity());
    }

    #[tokio::test]
    async fn test_simulate_disconnect_reports_once() {
        // Arrange
        let dir = tempdir().unwrap();
        let client = make_client(&dir, None);
        client.store.save("device-1", "test").unwrap();
        client.connect().await.unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        client.set_event_handler(Box::new(move |event| {
            if event == SessionEvent::Disconnected {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        // Act
        client.simulate_disconnect();
        client.simulate_disconnect();

        // Assert: the second call finds no live session
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!client.is_connected());
    }

    fn count_disconnects(client: &SimulatedSessionClient) -> Arc<AtomicU32> {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        client.set_event_handler(Box::new(move |event| {
            if event == SessionEvent::Disconnected {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));
        count
    }

    #[tokio::test]
    async fn test_drop_after_ends_resumed_session() {
        // Arrange
        let dir = tempdir().unwrap();
        let store = Arc::new(IdentityStore::open(dir.path().join("session.toml")).unwrap());
        store.save("device-1", "test").unwrap();
        let config = GatewayConfig {
            drop_after: Some(Duration::from_millis(20)),
            ..GatewayConfig::default()
        };
        let client = SimulatedSessionClient::new(store, &config);
        let count = count_disconnects(&client);

        // Act
        client.connect().await.unwrap();
        assert!(client.is_connected());
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Assert
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_drop_after_ends_freshly_paired_session() {
        // Arrange
        let dir = tempdir().unwrap();
        let store = Arc::new(IdentityStore::open(dir.path().join("session.toml")).unwrap());
        let config = GatewayConfig {
            qr_interval: Duration::from_millis(10),
            scan_after: Some(1),
            drop_after: Some(Duration::from_millis(20)),
            ..GatewayConfig::default()
        };
        let client = SimulatedSessionClient::new(store, &config);
        let count = count_disconnects(&client);
        let mut stream = client.open_pairing_stream().await.unwrap();

        // Act
        client.connect().await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }

        // Assert: the stream outlives the session by drop_after
        assert_eq!(events.last(), Some(&PairingEvent::Success));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_drops_pending_stream() {
        let dir = tempdir().unwrap();
        let client = make_client(&dir, None);
        let mut stream = client.open_pairing_stream().await.unwrap();

        client.disconnect().await;

        assert_eq!(stream.recv().await, None);
    }
}
