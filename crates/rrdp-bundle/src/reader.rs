//! Bundle reader with integrity verification.

use crate::{
    BundleError, BundleManifest, FileEntry, Result, MANIFEST_FILE_NAME, MAX_ENTRY_BYTES,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Reader for store bundles.
///
/// A bundle with a manifest has every entry checked against its recorded
/// SHA-256. A plain archive without one is read as-is.
pub struct BundleReader<R: Read + Seek> {
    manifest: Option<BundleManifest>,
    archive: ZipArchive<R>,
    verified: HashMap<String, bool>,
}

impl BundleReader<File> {
    /// Open a bundle from a file path.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl BundleReader<Cursor<Vec<u8>>> {
    /// Open a bundle from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> BundleReader<R> {
    /// Create a reader from any Read + Seek source.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let manifest = Self::read_manifest(&mut archive)?;
        if let Some(manifest) = &manifest {
            manifest.validate()?;
            for entry in &manifest.files {
                if archive.index_for_name(&entry.path).is_none() {
                    return Err(BundleError::MissingFile(entry.path.clone()));
                }
            }
        }

        let reader = Self {
            manifest,
            archive,
            verified: HashMap::new(),
        };
        info!(
            entries = reader.entries().len(),
            has_manifest = reader.manifest.is_some(),
            "Bundle opened"
        );
        Ok(reader)
    }

    fn read_manifest(archive: &mut ZipArchive<R>) -> Result<Option<BundleManifest>> {
        let mut manifest_file = match archive.by_name(MANIFEST_FILE_NAME) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if manifest_file.size() > MAX_ENTRY_BYTES {
            return Err(BundleError::EntryTooLarge {
                path: MANIFEST_FILE_NAME.to_string(),
                bytes: manifest_file.size(),
                limit: MAX_ENTRY_BYTES,
            });
        }

        let mut json = String::new();
        manifest_file.read_to_string(&mut json)?;
        let manifest = BundleManifest::from_json(&json)
            .map_err(|e| BundleError::CorruptedManifest(e.to_string()))?;
        Ok(Some(manifest))
    }

    /// The manifest, when the bundle has one.
    pub fn manifest(&self) -> Option<&BundleManifest> {
        self.manifest.as_ref()
    }

    /// Store entry names, sorted.
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = match &self.manifest {
            Some(manifest) => manifest.files.iter().map(|f| f.path.clone()).collect(),
            None => self
                .archive
                .file_names()
                .filter(|name| *name != MANIFEST_FILE_NAME && !name.ends_with('/'))
                .map(str::to_string)
                .collect(),
        };
        names.sort();
        names
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.entries().iter().any(|name| name == path)
    }

    /// Read an entry without verification.
    ///
    /// Use `read_verified` for integrity-checked reads.
    pub fn read_raw(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|_| BundleError::FileNotFound(path.to_string()))?;
        if file.size() > MAX_ENTRY_BYTES {
            return Err(BundleError::EntryTooLarge {
                path: path.to_string(),
                bytes: file.size(),
                limit: MAX_ENTRY_BYTES,
            });
        }

        let mut data = Vec::new();
        file.by_ref().take(MAX_ENTRY_BYTES + 1).read_to_end(&mut data)?;
        if data.len() as u64 > MAX_ENTRY_BYTES {
            return Err(BundleError::EntryTooLarge {
                path: path.to_string(),
                bytes: data.len() as u64,
                limit: MAX_ENTRY_BYTES,
            });
        }

        debug!(path, bytes = data.len(), "Read entry from bundle (unverified)");
        Ok(data)
    }

    /// Read an entry, checking it against the manifest when there is one.
    pub fn read_verified(&mut self, path: &str) -> Result<Vec<u8>> {
        let expected = match &self.manifest {
            Some(manifest) => Some(
                manifest
                    .find_file(path)
                    .ok_or_else(|| BundleError::FileNotFound(path.to_string()))?
                    .sha256
                    .clone(),
            ),
            None => None,
        };

        let data = self.read_raw(path)?;

        if let Some(expected) = expected {
            let actual = FileEntry::compute_checksum(&data);
            if actual != expected {
                return Err(BundleError::ChecksumMismatch {
                    path: path.to_string(),
                    expected,
                    actual,
                });
            }
            self.verified.insert(path.to_string(), true);
            debug!(path, "Entry verified");
        }

        Ok(data)
    }

    /// Whether an entry passed checksum verification.
    pub fn is_verified(&self, path: &str) -> bool {
        self.verified.get(path).copied().unwrap_or(false)
    }

    /// Verify all entries. Returns the names that failed.
    pub fn verify_all(&mut self) -> Vec<String> {
        let mut failures = Vec::new();

        for path in self.entries() {
            if let Err(e) = self.read_verified(&path) {
                warn!(path = %path, error = %e, "Verification failed");
                failures.push(path);
            }
        }

        if failures.is_empty() {
            debug!("All entries verified");
        } else {
            warn!(failures = ?failures, "Some entries failed verification");
        }

        failures
    }

    /// Read every entry, stopping at the first failure.
    pub fn read_all(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for path in self.entries() {
            if path.contains('/') || path.contains('\\') || path.starts_with('.') {
                return Err(BundleError::InvalidEntryName(path));
            }
            let data = self.read_verified(&path)?;
            out.push((path, data));
        }
        Ok(out)
    }
}
