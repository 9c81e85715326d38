//! TOML-backed device identity store.
//!
//! The file is tiny and written rarely (once per successful pairing, once per
//! forced re-pair), so plain synchronous `std::fs` calls are used.  A missing
//! file means "no stored identity" and is not an error.
//!
//! ```toml
//! device_id = "4f6c2b0e9d1a4c7e8b3f5a2d1e0c9b8a"
//! device_name = "pairing-gateway"
//! ```

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for identity file operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing identity file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse identity TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The identity could not be serialized to TOML.
    #[error("failed to serialize identity: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk contents of the identity file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredIdentity {
    /// Identity issued by the backend after a successful pairing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Device name the identity was registered under.
    #[serde(default)]
    pub device_name: String,
}

/// File-backed identity store with an in-memory copy.
#[derive(Debug)]
pub struct IdentityStore {
    path: PathBuf,
    current: Mutex<StoredIdentity>,
}

impl IdentityStore {
    /// Opens the store at `path`, loading the file if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be read, or
    /// [`StorageError::Parse`] if it is not valid TOML.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let current = load(&path)?;
        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if a device identity is stored.
    pub fn has_identity(&self) -> bool {
        self.current.lock().device_id.is_some()
    }

    /// Returns a copy of the stored identity.
    pub fn current(&self) -> StoredIdentity {
        self.current.lock().clone()
    }

    /// Persists a freshly issued identity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] or [`StorageError::Serialize`]; the
    /// in-memory copy is only updated once the file write succeeds.
    pub fn save(
        &self,
        device_id: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Result<(), StorageError> {
        let identity = StoredIdentity {
            device_id: Some(device_id.into()),
            device_name: device_name.into(),
        };
        let mut current = self.current.lock();
        write(&self.path, &identity)?;
        *current = identity;
        Ok(())
    }

    /// Deletes the stored identity so the next connect must pair again.
    ///
    /// Clearing a store that holds nothing succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut current = self.current.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        }
        *current = StoredIdentity::default();
        Ok(())
    }
}

fn load(path: &Path) -> Result<StoredIdentity, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredIdentity::default()),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write(path: &Path, identity: &StoredIdentity) -> Result<(), StorageError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(identity)?;
    std::fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
