//! pairing-gateway library crate.
//!
//! This crate keeps one linked messaging-device session alive and streams its
//! pairing codes and connection status to any number of WebSocket
//! subscribers.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! messaging backend ──events──► SessionEventAdapter ──► Broadcaster ──► subscribers
//!        ▲                                │                  ▲
//!        │ connect / pairing stream       ▼                  │ qr codes
//!        └────────────────── ReconnectOrchestrator ──────────┘
//!
//! [pairing-gateway]
//!   ├── domain/           GatewayConfig
//!   ├── application/      Registry, Broadcaster, event adapter, orchestrator
//!   └── infrastructure/
//!         ├── ws_server/       WebSocket accept loop (tokio-tungstenite)
//!         ├── session_client/  SessionClient trait, mock and simulated backends
//!         └── storage/         File-backed device identity
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `pairing-core`, and the
//!   `SessionClient` trait; it never opens sockets.
//! - `infrastructure` owns sockets, files, and task spawning for sessions.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: fan-out, event dispatch, and reconnection.
pub mod application;

/// Infrastructure layer: WebSocket server, backend clients, storage.
pub mod infrastructure;
