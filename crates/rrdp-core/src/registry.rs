//! Store registry: entity name to file location.
//!
//! One file per entity, `<root>/<name>.rrd`. The mapping is reversible:
//! [`StoreRegistry::identity_of`] recovers the name from a path.

use rrdp_common::{Error, Result};
use rrdp_format::{temp_path_for, STORE_EXTENSION};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check that `name` is usable as a store file stem.
///
/// Names are non-empty ASCII letters, digits, `_` or `-`.
pub fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct StoreRegistry {
    root: PathBuf,
}

impl StoreRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The service root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the service root if missing. Idempotent.
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        debug!(path = %self.root.display(), "store root ready");
        Ok(())
    }

    /// Path of the store for `name`. Does not touch the file system.
    pub fn locate(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{STORE_EXTENSION}"))
    }

    /// Like [`locate`](Self::locate), rejecting unusable names first.
    pub fn checked_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.locate(name))
    }

    /// Recover the entity name from a store path.
    pub fn identity_of(path: &Path) -> Option<String> {
        if path.extension().and_then(|e| e.to_str()) != Some(STORE_EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        validate_name(stem).ok()?;
        Some(stem.to_string())
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.locate(name).is_file()
    }

    /// Names with a store on disk, sorted.
    ///
    /// A missing root lists as empty. Temp files and foreign files are
    /// ignored.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| Error::io(&self.root, e))?;

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| Self::identity_of(&path))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Remove a leftover `<file>.tmp` for `name`, if any.
    pub fn clear_temp(&self, name: &str) {
        let temp = temp_path_for(&self.locate(name));
        if temp.exists() && std::fs::remove_file(&temp).is_ok() {
            debug!(entity = name, path = %temp.display(), "removed stale temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn name_rules() {
        assert!(validate_name("temp").is_ok());
        assert!(validate_name("Living_Room-2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("temp.rrd").is_err());
        assert!(validate_name("caf\u{e9}").is_err());
    }

    #[test]
    fn locate_and_identity_are_inverse() {
        let registry = StoreRegistry::new("/data/rrd");
        let path = registry.locate("temp");
        assert_eq!(path, PathBuf::from("/data/rrd/temp.rrd"));
        assert_eq!(StoreRegistry::identity_of(&path).as_deref(), Some("temp"));
    }

    #[test]
    fn identity_rejects_other_files() {
        assert!(StoreRegistry::identity_of(Path::new("/x/temp.rrd.tmp")).is_none());
        assert!(StoreRegistry::identity_of(Path::new("/x/notes.txt")).is_none());
        assert!(StoreRegistry::identity_of(Path::new("/x/.rrd")).is_none());
    }

    #[test]
    fn list_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::new(dir.path().join("rrd"));
        assert!(registry.list().unwrap().is_empty());

        registry.ensure_root().unwrap();
        registry.ensure_root().unwrap();
        for file in ["zeta.rrd", "alpha.rrd", "alpha.rrd.tmp", "readme.md"] {
            std::fs::write(registry.root().join(file), b"x").unwrap();
        }
        std::fs::create_dir(registry.root().join("dir.rrd")).unwrap();

        assert_eq!(registry.list().unwrap(), vec!["alpha", "zeta"]);
        assert!(registry.exists("alpha"));
        assert!(!registry.exists("missing"));
        assert!(!registry.exists("../alpha"));

        registry.clear_temp("alpha");
        assert!(!registry.root().join("alpha.rrd.tmp").exists());
    }
}
