//! Bundle manifest types and serialization.
//!
//! The manifest is the source of truth for a bundle's contents: its format
//! version, when it was made, and one checksummed entry per store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Current bundle schema version.
pub const BUNDLE_SCHEMA_VERSION: &str = "1.0.0";

/// Manifest file name within the bundle.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Bundle manifest containing metadata and file checksums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Bundle format version.
    pub bundle_version: String,

    /// When the bundle was created.
    pub created_at: DateTime<Utc>,

    /// Stores included in the bundle with checksums.
    pub files: Vec<FileEntry>,

    /// Optional description or notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// rrdp version that created this bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrdp_version: Option<String>,
}

impl Default for BundleManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleManifest {
    pub fn new() -> Self {
        Self {
            bundle_version: BUNDLE_SCHEMA_VERSION.to_string(),
            created_at: Utc::now(),
            files: Vec::new(),
            description: None,
            rrdp_version: None,
        }
    }

    pub fn with_rrdp_version(mut self, version: impl Into<String>) -> Self {
        self.rrdp_version = Some(version.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn add_file(&mut self, entry: FileEntry) {
        self.files.push(entry);
    }

    /// Total size of all stores in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn find_file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Validate the manifest structure.
    pub fn validate(&self) -> crate::Result<()> {
        if self.bundle_version != BUNDLE_SCHEMA_VERSION {
            return Err(crate::BundleError::UnsupportedVersion {
                version: self.bundle_version.clone(),
                supported: BUNDLE_SCHEMA_VERSION.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            if file.path.is_empty() {
                return Err(crate::BundleError::CorruptedManifest(
                    "file entry has empty path".to_string(),
                ));
            }
            if file.path == MANIFEST_FILE_NAME {
                return Err(crate::BundleError::CorruptedManifest(
                    "manifest lists itself".to_string(),
                ));
            }
            if file.sha256.len() != 64 || hex::decode(&file.sha256).is_err() {
                return Err(crate::BundleError::CorruptedManifest(format!(
                    "file '{}' has invalid checksum",
                    file.path
                )));
            }
            if !seen.insert(file.path.as_str()) {
                return Err(crate::BundleError::CorruptedManifest(format!(
                    "file '{}' listed twice",
                    file.path
                )));
            }
        }

        Ok(())
    }

    /// Sort files for deterministic ordering.
    pub fn sort_files(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
    }

    /// Serialize to JSON with consistent formatting.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Manifest entry for one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name within the bundle (the entity name).
    pub path: String,

    /// SHA-256 checksum (64 hex characters).
    pub sha256: String,

    /// Size in bytes.
    pub bytes: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, sha256: impl Into<String>, bytes: u64) -> Self {
        Self {
            path: path.into(),
            sha256: sha256.into(),
            bytes,
        }
    }

    /// Entry for `data`, checksum computed.
    pub fn for_data(path: impl Into<String>, data: &[u8]) -> Self {
        Self::new(path, Self::compute_checksum(data), data.len() as u64)
    }

    /// Compute SHA-256 checksum of data.
    pub fn compute_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute_checksum(data) == self.sha256
    }
}
