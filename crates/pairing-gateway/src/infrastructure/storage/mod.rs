//! Storage infrastructure: persistence of the linked-device identity.
//!
//! The messaging backend issues a device identity once pairing succeeds.
//! Keeping it on disk lets the next start reconnect without a new scan; a
//! forced re-pair deletes it.  See [`identity::IdentityStore`].

pub mod identity;

pub use identity::{IdentityStore, StorageError, StoredIdentity};
