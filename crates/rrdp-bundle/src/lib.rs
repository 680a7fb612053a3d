//! Export/import bundles for rrdp stores.
//!
//! A bundle carries the raw bytes of any number of store files so they can
//! be moved between installations or kept as a backup.
//!
//! # Bundle Format
//!
//! Bundles are ZIP archives containing:
//! - `manifest.json`: bundle version, creation time, one entry per store with
//!   its SHA-256 checksum
//! - one entry per store, named by the entity name (no extension), holding
//!   the store file bytes unchanged
//!
//! Readers also accept archives without a manifest. Their entries cannot be
//! checksum-verified here, so callers validate each one by decoding it.
//!
//! # Text-safe transfer
//!
//! [`encode_text`] and [`decode_text`] wrap any byte blob in standard base64
//! for transports that only carry text.
//!
//! # Example
//!
//! ```no_run
//! use rrdp_bundle::{BundleReader, BundleWriter};
//!
//! let mut writer = BundleWriter::new();
//! writer.add_store("temp", std::fs::read("temp.rrd").unwrap());
//! let (bytes, _manifest) = writer.write_to_vec().unwrap();
//!
//! let mut reader = BundleReader::from_bytes(bytes).unwrap();
//! for (name, data) in reader.read_all().unwrap() {
//!     println!("{name}: {} bytes", data.len());
//! }
//! ```

pub mod error;
pub mod manifest;
pub mod reader;
pub mod text;
pub mod writer;

pub use error::{BundleError, Result};
pub use manifest::{BundleManifest, FileEntry, BUNDLE_SCHEMA_VERSION, MANIFEST_FILE_NAME};
pub use reader::BundleReader;
pub use text::{decode_text, encode_text};
pub use writer::BundleWriter;

/// Largest entry a reader will inflate.
pub const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;
