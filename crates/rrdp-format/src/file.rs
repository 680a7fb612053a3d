//! Store file I/O with crash-safe replacement.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec;
use crate::error::FormatError;
use crate::store::RoundRobinStore;

/// Suffix of in-flight writes.
pub const TEMP_SUFFIX: &str = "tmp";

/// Path of the temporary sibling used while replacing `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Read and decode the store at `path`.
pub fn read_store(path: &Path) -> Result<RoundRobinStore, FormatError> {
    let bytes = fs::read(path)?;
    codec::decode(&bytes)
}

/// Encode `store` and atomically replace `path` with it.
pub fn write_store(path: &Path, store: &RoundRobinStore) -> Result<(), FormatError> {
    write_bytes(path, &codec::encode(store))
}

/// Atomically replace `path` with `bytes`.
///
/// The bytes go to `<path>.tmp` first and are renamed into place, so readers
/// see either the old file or the new one.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), FormatError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = temp_path_for(path);
    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        atomic_rename(&temp_path, path)
    })();
    match &result {
        Ok(()) => debug!(path = %path.display(), bytes = bytes.len(), "store file written"),
        Err(_) => {
            let _ = fs::remove_file(&temp_path);
        }
    }
    result
}

/// Rename the temp file into place (atomic on the same filesystem).
pub fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<(), FormatError> {
    fs::rename(temp_path, final_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConsolidationFunction, StoreSchema};
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("temp.rrd");
        let mut store =
            RoundRobinStore::create(StoreSchema::default_with(ConsolidationFunction::Max), 9)
                .unwrap();
        store.update(10, 3.0).unwrap();
        write_store(&path, &store).unwrap();

        assert!(!temp_path_for(&path).exists());
        let back = read_store(&path).unwrap();
        assert_eq!(back.last_value(), 3.0);
        assert_eq!(back.consolidation(), ConsolidationFunction::Max);
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path_for(Path::new("/data/temp.rrd")),
            PathBuf::from("/data/temp.rrd.tmp")
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_store(&dir.path().join("absent.rrd")).unwrap_err();
        assert!(matches!(err, FormatError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
        assert!(!err.is_corruption());
    }

    #[test]
    fn garbage_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.rrd");
        fs::write(&path, b"not a store").unwrap();
        assert!(read_store(&path).unwrap_err().is_corruption());
    }
}
