//! Domain entities for the pairing gateway.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the gateway is the **domain**.  Domain code:
//!
//! - Contains the core rules of the system: what "connected" means, which
//!   status strings exist, and how a disconnect invalidates a pairing code.
//! - Has **no** imports from network libraries, async runtimes, or the
//!   messaging backend.
//! - Can be compiled and tested on any platform without any external setup.

pub mod session;
pub mod status;
