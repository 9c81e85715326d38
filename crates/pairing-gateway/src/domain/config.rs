//! Gateway configuration types.
//!
//! [`GatewayConfig`] is the single source of truth for all runtime settings.
//! It is built once by `main.rs` from CLI arguments (with environment and
//! `.env` fallbacks) and then handed to the components that need it.  There
//! is no global configuration state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default WebSocket upgrade path.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// All runtime configuration for the gateway.
///
/// # Example
///
/// ```rust
/// use pairing_gateway::domain::GatewayConfig;
///
/// let cfg = GatewayConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8080);
/// assert_eq!(cfg.ws_path, "/ws");
/// ```
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// The address and port the WebSocket server binds to.
    pub ws_bind_addr: SocketAddr,

    /// The only request path accepted for the WebSocket upgrade.
    ///
    /// Upgrades to any other path are refused with `404 Not Found` during the
    /// handshake.
    pub ws_path: String,

    /// Device name reported to the messaging backend.
    pub app_name: String,

    /// Application version reported to the messaging backend.
    pub app_version: String,

    /// File holding the stored device identity.
    pub session_file: PathBuf,

    /// Capacity of each subscriber's outbound queue.
    ///
    /// A subscriber whose queue is full when a broadcast arrives is treated
    /// as failed and dropped, so one stalled browser never holds up others.
    pub outbound_buffer: usize,

    /// Maximum time a single WebSocket frame write may take.
    pub send_timeout: Duration,

    /// How often the simulated backend rotates its pairing code.
    pub qr_interval: Duration,

    /// When set, the simulated backend reports a successful scan after this
    /// many codes.  `None` waits forever.
    pub scan_after: Option<u32>,

    /// When set, the simulated backend drops each established session after
    /// this long, which exercises the re-pairing path.  `None` keeps
    /// sessions up until shutdown.
    pub drop_after: Option<Duration>,
}

impl Default for GatewayConfig {
    /// Returns a `GatewayConfig` suitable for local development.
    ///
    /// | Field           | Default           |
    /// |-----------------|-------------------|
    /// | ws_bind_addr    | `0.0.0.0:8080`    |
    /// | ws_path         | `/ws`             |
    /// | app_name        | `pairing-gateway` |
    /// | session_file    | `session.toml`    |
    /// | outbound_buffer | 32                |
    /// | send_timeout    | 5 seconds         |
    /// | qr_interval     | 20 seconds        |
    /// | scan_after      | none              |
    /// | drop_after      | none              |
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ws_path: DEFAULT_WS_PATH.to_string(),
            app_name: "pairing-gateway".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            session_file: PathBuf::from("session.toml"),
            outbound_buffer: 32,
            send_timeout: Duration::from_secs(5),
            qr_interval: Duration::from_secs(20),
            scan_after: None,
            drop_after: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_8080() {
        // Arrange / Act
        let cfg = GatewayConfig::default();
        // Assert
        assert_eq!(cfg.ws_bind_addr.port(), 8080);
    }

    #[test]
    fn test_default_binds_all_interfaces() {
        let cfg = GatewayConfig::default();
        assert!(cfg.ws_bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_ws_path() {
        assert_eq!(GatewayConfig::default().ws_path, "/ws");
    }

    #[test]
    fn test_default_outbound_buffer_is_nonzero() {
        // tokio's bounded mpsc panics on a zero capacity.
        assert!(GatewayConfig::default().outbound_buffer > 0);
    }

    #[test]
    fn test_default_timeouts() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.send_timeout, Duration::from_secs(5));
        assert_eq!(cfg.qr_interval, Duration::from_secs(20));
    }

    #[test]
    fn test_default_never_simulates_a_scan() {
        assert_eq!(GatewayConfig::default().scan_after, None);
    }

    #[test]
    fn test_default_never_drops_a_session() {
        assert_eq!(GatewayConfig::default().drop_after, None);
    }

    #[test]
    fn test_default_version_matches_crate() {
        assert_eq!(GatewayConfig::default().app_version, env!("CARGO_PKG_VERSION"));
    }
}
