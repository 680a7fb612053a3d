//! Locked access to store files.
//!
//! [`Storage`] pairs the registry with the per-store locks. The load/save
//! helpers do not lock on their own: callers wrap a whole read-modify-write
//! in [`Storage::with_lock`].

use crate::locks::StoreLocks;
use crate::registry::{validate_name, StoreRegistry};
use rrdp_common::{Error, Result};
use rrdp_format::{decode, encode, read_store, write_bytes, FormatError, RoundRobinStore};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub struct Storage {
    registry: StoreRegistry,
    locks: StoreLocks,
}

impl Storage {
    pub fn new(registry: StoreRegistry) -> Self {
        Self {
            registry,
            locks: StoreLocks::new(),
        }
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Run `f` under the lock of `name`.
    ///
    /// Invalid names are rejected before a lock is created for them.
    pub fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        validate_name(name)?;
        self.locks.with(name, f)
    }

    /// Load the store of `name`. `StoreNotFound` when there is none.
    pub fn load(&self, name: &str) -> Result<RoundRobinStore> {
        let path = self.registry.checked_path(name)?;
        read_store(&path).map_err(|e| classify(name, &path, e))
    }

    /// Load the store of `name`, `None` when there is none yet.
    pub fn load_if_present(&self, name: &str) -> Result<Option<RoundRobinStore>> {
        match self.load(name) {
            Ok(store) => Ok(Some(store)),
            Err(Error::StoreNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, name: &str, store: &RoundRobinStore) -> Result<()> {
        self.write_raw(name, &encode(store))
    }

    /// Raw file bytes of `name`'s store.
    pub fn read_raw(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.registry.checked_path(name)?;
        std::fs::read(&path).map_err(|e| classify(name, &path, FormatError::Io(e)))
    }

    /// Replace `name`'s store file with `bytes` after checking they decode.
    pub fn replace_raw(&self, name: &str, bytes: &[u8]) -> Result<()> {
        decode(bytes).map_err(|e| Error::corrupt(name, e))?;
        self.write_raw(name, bytes)
    }

    fn write_raw(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.registry.checked_path(name)?;
        write_bytes(&path, bytes).map_err(|e| classify(name, &path, e))
    }

    /// Delete `name`'s store file. Returns whether one existed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.registry.checked_path(name)?;
        self.registry.clear_temp(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(entity = name, path = %path.display(), "store file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

/// Map a format-level failure on `path` into the engine taxonomy.
fn classify(name: &str, path: &Path, err: FormatError) -> Error {
    match err {
        FormatError::Io(e) if e.kind() == ErrorKind::NotFound => {
            Error::StoreNotFound(name.to_string())
        }
        FormatError::Io(e) => Error::io(path, e),
        other => Error::corrupt(name, other),
    }
}
