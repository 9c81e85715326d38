//! Pairing gateway entry point.
//!
//! Keeps one linked-device session with the messaging backend alive and
//! streams its pairing codes and connection status to browsers over
//! WebSocket.
//!
//! # Usage
//!
//! ```text
//! pairing-gateway [OPTIONS]
//!
//! Options:
//!   --port            <PORT>  WebSocket listener port [default: 8080]
//!   --bind            <ADDR>  Address to bind [default: 0.0.0.0]
//!   --ws-path         <PATH>  Accepted upgrade path [default: /ws]
//!   --app-name        <NAME>  Device name reported to the backend
//!   --app-version     <VER>   Version reported to the backend
//!   --session-file    <FILE>  Stored device identity [default: session.toml]
//!   --outbound-buffer <N>     Per-subscriber queue size [default: 32]
//!   --send-timeout    <SECS>  Per-frame write timeout [default: 5]
//!   --qr-interval     <SECS>  Pairing code rotation [default: 20]
//!   --scan-after      <N>     Simulate a scan after N codes
//!   --drop-after      <SECS>  Simulate a dropped session after SECS
//! ```
//!
//! # Environment variable overrides
//!
//! Every option can also come from the environment, and a `.env` file in the
//! working directory is loaded first.  CLI args take precedence.
//!
//! | Variable            | Default           |
//! |---------------------|-------------------|
//! | `PORT`              | `8080`            |
//! | `BIND_ADDRESS`      | `0.0.0.0`         |
//! | `WS_PATH`           | `/ws`             |
//! | `APP_NAME`          | `pairing-gateway` |
//! | `APP_VERSION`       | crate version     |
//! | `SESSION_FILE`      | `session.toml`    |
//! | `OUTBOUND_BUFFER`   | `32`              |
//! | `SEND_TIMEOUT_SECS` | `5`               |
//! | `QR_INTERVAL_SECS`  | `20`              |
//! | `SCAN_AFTER`        | unset             |
//! | `DROP_AFTER_SECS`   | unset             |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pairing_core::StateStore;
use pairing_gateway::application::{Broadcaster, ReconnectOrchestrator, SessionEventAdapter};
use pairing_gateway::domain::GatewayConfig;
use pairing_gateway::infrastructure::session_client::simulated::SimulatedSessionClient;
use pairing_gateway::infrastructure::session_client::SessionClient;
use pairing_gateway::infrastructure::storage::IdentityStore;
use pairing_gateway::infrastructure::ws_server::run_server;

/// How long shutdown waits for the orchestrator to stop.
const ORCHESTRATOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Streams linked-device pairing codes and session status to WebSocket
/// subscribers.
#[derive(Debug, Parser)]
#[command(
    name = "pairing-gateway",
    about = "Broadcasts device pairing codes and session status over WebSocket",
    version
)]
struct Cli {
    /// TCP port for the WebSocket server.
    #[arg(long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// IP address to bind the WebSocket server to.
    #[arg(long, default_value = "0.0.0.0", env = "BIND_ADDRESS")]
    bind: String,

    /// Request path accepted for the WebSocket upgrade.
    #[arg(long, default_value = "/ws", env = "WS_PATH")]
    ws_path: String,

    /// Device name reported to the messaging backend.
    #[arg(long, default_value = "pairing-gateway", env = "APP_NAME")]
    app_name: String,

    /// Application version reported to the messaging backend.
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"), env = "APP_VERSION")]
    app_version: String,

    /// File holding the stored device identity.
    #[arg(long, default_value = "session.toml", env = "SESSION_FILE")]
    session_file: PathBuf,

    /// Outbound queue size per subscriber.  A subscriber that falls this far
    /// behind is dropped.
    #[arg(long, default_value_t = 32, env = "OUTBOUND_BUFFER")]
    outbound_buffer: usize,

    /// Per-frame WebSocket write timeout in seconds.
    #[arg(long, default_value_t = 5, env = "SEND_TIMEOUT_SECS")]
    send_timeout: u64,

    /// Seconds between pairing codes from the simulated backend.
    #[arg(long, default_value_t = 20, env = "QR_INTERVAL_SECS")]
    qr_interval: u64,

    /// Make the simulated backend accept a scan after this many codes.
    #[arg(long, env = "SCAN_AFTER")]
    scan_after: Option<u32>,

    /// Make the simulated backend drop each session after this many seconds.
    #[arg(long, env = "DROP_AFTER_SECS")]
    drop_after: Option<u64>,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`GatewayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address or `--ws-path`
    /// does not start with `/`.  Zero is rejected for `--outbound-buffer`,
    /// `--send-timeout`, `--qr-interval` and `--drop-after`.
    fn into_gateway_config(self) -> anyhow::Result<GatewayConfig> {
        let ws_bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| {
                format!("invalid WebSocket bind address: '{}:{}'", self.bind, self.port)
            })?;

        anyhow::ensure!(
            self.ws_path.starts_with('/'),
            "WebSocket path must start with '/': '{}'",
            self.ws_path
        );
        anyhow::ensure!(self.outbound_buffer > 0, "outbound buffer must be at least 1");
        anyhow::ensure!(self.send_timeout > 0, "send timeout must be at least 1 second");
        anyhow::ensure!(self.qr_interval > 0, "QR interval must be at least 1 second");
        anyhow::ensure!(
            self.drop_after != Some(0),
            "drop-after must be at least 1 second when set"
        );

        Ok(GatewayConfig {
            ws_bind_addr,
            ws_path: self.ws_path,
            app_name: self.app_name,
            app_version: self.app_version,
            session_file: self.session_file,
            outbound_buffer: self.outbound_buffer,
            send_timeout: Duration::from_secs(self.send_timeout),
            qr_interval: Duration::from_secs(self.qr_interval),
            scan_after: self.scan_after,
            drop_after: self.drop_after.map(Duration::from_secs),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `.env` is loaded (if present), then tracing is initialised from
///    `RUST_LOG` (default `info`).
/// 2. CLI arguments are parsed into a [`GatewayConfig`].
/// 3. The identity store, backend client, broadcaster, orchestrator and event
///    adapter are built and wired together.
/// 4. The orchestrator is spawned and the WebSocket server runs until Ctrl+C
///    flips the shutdown channel.
/// 5. On shutdown all subscribers are closed, the orchestrator stops and the
///    backend is disconnected.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_gateway_config()?;

    info!(
        "pairing gateway starting: ws={}{}, device={} {}",
        config.ws_bind_addr, config.ws_path, config.app_name, config.app_version
    );

    // ── Wiring ────────────────────────────────────────────────────────────────
    let store = Arc::new(IdentityStore::open(&config.session_file).with_context(|| {
        format!(
            "failed to open identity store at {}",
            config.session_file.display()
        )
    })?);
    let client = Arc::new(SimulatedSessionClient::new(store, &config));
    let broadcaster = Arc::new(Broadcaster::new(Arc::new(StateStore::new())));
    let orchestrator = ReconnectOrchestrator::new(
        Arc::clone(&client) as Arc<dyn SessionClient>,
        Arc::clone(&broadcaster),
    );
    let adapter = SessionEventAdapter::new(Arc::clone(&broadcaster), orchestrator.handle());
    client.set_event_handler(adapter.into_handler());

    // ── Graceful shutdown ─────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                signal_tx.send_replace(true);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let orchestrator_task = tokio::spawn(orchestrator.run(shutdown_rx.clone()));

    // ── Main server loop ──────────────────────────────────────────────────────
    run_server(config, Arc::clone(&broadcaster), shutdown_rx).await?;

    shutdown_tx.send_replace(true);
    if tokio::time::timeout(ORCHESTRATOR_STOP_TIMEOUT, orchestrator_task)
        .await
        .is_err()
    {
        warn!("orchestrator did not stop within {ORCHESTRATOR_STOP_TIMEOUT:?}");
    }
    client.disconnect().await;

    info!("pairing gateway stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
