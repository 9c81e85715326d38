//! Domain layer for pairing-gateway.
//!
//! The session state model and wire vocabulary live in `pairing-core`; the
//! gateway's own domain is its runtime configuration.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;

pub use config::GatewayConfig;
