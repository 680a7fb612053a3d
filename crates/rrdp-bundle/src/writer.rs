//! Bundle writer.
//!
//! Creates ZIP archives with a manifest and one entry per store.

use crate::{BundleManifest, FileEntry, Result, MANIFEST_FILE_NAME};
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Builder for store bundles.
#[derive(Default)]
pub struct BundleWriter {
    manifest: BundleManifest,
    files: Vec<(String, Vec<u8>)>,
}

impl BundleWriter {
    pub fn new() -> Self {
        Self {
            manifest: BundleManifest::new(),
            files: Vec::new(),
        }
    }

    /// Set the rrdp version recorded in the manifest.
    pub fn with_rrdp_version(mut self, version: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_rrdp_version(version);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_description(description);
        self
    }

    /// Add one store's bytes under its entity name.
    pub fn add_store(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        let entry = FileEntry::for_data(&name, &data);
        debug!(entity = %name, bytes = entry.bytes, "Added store to bundle");
        self.manifest.add_file(entry);
        self.files.push((name, data));
    }

    /// The manifest as it stands (for inspection before writing).
    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// Total size in bytes before compression.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|(_, data)| data.len() as u64).sum()
    }

    /// Store count (not including the manifest).
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Write the bundle to a file.
    pub fn write(self, path: &Path) -> Result<BundleManifest> {
        let file = File::create(path)?;
        let (_, manifest) = self.write_into(file)?;
        info!(
            path = %path.display(),
            stores = manifest.file_count(),
            bytes = manifest.total_bytes(),
            "Bundle written"
        );
        Ok(manifest)
    }

    /// Write the bundle to a byte vector (for in-memory use).
    pub fn write_to_vec(self) -> Result<(Vec<u8>, BundleManifest)> {
        let uncompressed = self.total_bytes();
        let (buffer, manifest) = self.write_into(Cursor::new(Vec::new()))?;
        let bytes = buffer.into_inner();

        info!(
            stores = manifest.file_count(),
            compressed_bytes = bytes.len(),
            uncompressed_bytes = uncompressed,
            "Bundle written to memory"
        );

        Ok((bytes, manifest))
    }

    fn write_into<W: Write + Seek>(mut self, sink: W) -> Result<(W, BundleManifest)> {
        // Sort files for deterministic ordering
        self.manifest.sort_files();
        self.files.sort_by(|a, b| a.0.cmp(&b.0));

        let manifest_json = self.manifest.to_json()?;

        let mut zip = ZipWriter::new(sink);
        let options: FileOptions<'_, ()> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        // Manifest first
        zip.start_file(MANIFEST_FILE_NAME, options)?;
        zip.write_all(manifest_json.as_bytes())?;

        for (name, data) in &self.files {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        let sink = zip.finish()?;
        Ok((sink, self.manifest))
    }
}
