//! Infrastructure layer for the gateway.
//!
//! Contains the I/O-facing adapters: the WebSocket accept loop, the messaging
//! backend clients, and file-system storage for the device identity.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain`, and
//! `pairing_core`.  The application layer only reaches in here for the
//! [`session_client::SessionClient`] trait it drives.

pub mod session_client;
pub mod storage;
pub mod ws_server;
