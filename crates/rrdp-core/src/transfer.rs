//! Export and import of store files.
//!
//! `export_all` produces a bundle (ZIP with manifest); `export_one` produces
//! the bare store file. Either can be wrapped in base64 for text-only
//! transports.

use crate::registry::validate_name;
use crate::storage::Storage;
use rrdp_bundle::{decode_text, encode_text, BundleError, BundleReader, BundleWriter};
use rrdp_common::{Error, Result};
use rrdp_format::decode;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Wire encoding of an exported blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferEncoding {
    #[default]
    Binary,
    Base64,
}

impl TransferEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEncoding::Binary => "binary",
            TransferEncoding::Base64 => "base64",
        }
    }

    fn wrap(self, bytes: Vec<u8>) -> Vec<u8> {
        match self {
            TransferEncoding::Binary => bytes,
            TransferEncoding::Base64 => encode_text(&bytes).into_bytes(),
        }
    }

    fn unwrap_blob(self, blob: &[u8]) -> Result<Vec<u8>> {
        match self {
            TransferEncoding::Binary => Ok(blob.to_vec()),
            TransferEncoding::Base64 => {
                let text = std::str::from_utf8(blob)
                    .map_err(|e| Error::Bundle(format!("base64 payload is not text: {e}")))?;
                decode_text(text).map_err(bundle_error)
            }
        }
    }
}

impl std::fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "raw" => Ok(TransferEncoding::Binary),
            "base64" | "text" => Ok(TransferEncoding::Base64),
            other => Err(format!("unknown encoding '{other}' (expected binary or base64)")),
        }
    }
}

fn bundle_error(err: BundleError) -> Error {
    Error::Bundle(err.to_string())
}

/// Bundle every readable store.
///
/// Stores that cannot be read or do not decode are logged and left out.
pub fn export_all(storage: &Storage, encoding: TransferEncoding) -> Result<Vec<u8>> {
    let mut writer = BundleWriter::new().with_rrdp_version(env!("CARGO_PKG_VERSION"));
    for name in storage.registry().list()? {
        let bytes = storage.with_lock(&name, || {
            let bytes = storage.read_raw(&name)?;
            decode(&bytes).map_err(|e| Error::corrupt(&name, e))?;
            Ok::<_, Error>(bytes)
        });
        match bytes {
            Ok(bytes) => writer.add_store(name, bytes),
            Err(e) => warn!(entity = %name, error = %e, "leaving store out of export"),
        }
    }
    let (bytes, manifest) = writer.write_to_vec().map_err(bundle_error)?;
    info!(
        stores = manifest.file_count(),
        bytes = bytes.len(),
        %encoding,
        "exported all stores"
    );
    Ok(encoding.wrap(bytes))
}

/// The store file of `name`.
pub fn export_one(storage: &Storage, name: &str, encoding: TransferEncoding) -> Result<Vec<u8>> {
    let bytes = storage.with_lock(name, || storage.read_raw(name))?;
    debug!(entity = name, bytes = bytes.len(), %encoding, "exported store");
    Ok(encoding.wrap(bytes))
}

/// Replace stores with the contents of a bundle.
///
/// Every entry is verified and decoded before the first file is written,
/// so a bad bundle changes nothing. Returns the imported names, sorted.
pub fn import_all(storage: &Storage, blob: &[u8], encoding: TransferEncoding) -> Result<Vec<String>> {
    let bytes = encoding.unwrap_blob(blob)?;
    let mut reader = BundleReader::from_bytes(bytes).map_err(bundle_error)?;
    let entries = reader.read_all().map_err(bundle_error)?;

    for (name, data) in &entries {
        validate_name(name)?;
        decode(data).map_err(|e| Error::corrupt(name, e))?;
    }

    let mut imported = Vec::with_capacity(entries.len());
    for (name, data) in entries {
        storage.with_lock(&name, || storage.replace_raw(&name, &data))?;
        imported.push(name);
    }
    info!(stores = imported.len(), "imported bundle");
    Ok(imported)
}

/// Replace the store of `name` with `blob`.
pub fn import_one(
    storage: &Storage,
    name: &str,
    blob: &[u8],
    encoding: TransferEncoding,
) -> Result<()> {
    validate_name(name)?;
    let bytes = encoding.unwrap_blob(blob)?;
    storage.with_lock(name, || storage.replace_raw(name, &bytes))?;
    info!(entity = name, bytes = bytes.len(), "imported store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StoreRegistry;
    use rrdp_format::{encode, ConsolidationFunction, RoundRobinStore, StoreSchema};
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> Storage {
        let registry = StoreRegistry::new(dir.path());
        registry.ensure_root().unwrap();
        Storage::new(registry)
    }

    fn store_bytes(t: u64, v: f64) -> Vec<u8> {
        let schema = StoreSchema::default_with(ConsolidationFunction::Average);
        let mut store = RoundRobinStore::create(schema, t - 1).unwrap();
        store.update(t, v).unwrap();
        encode(&store)
    }

    #[test]
    fn encoding_parse_and_display() {
        assert_eq!("BASE64".parse::<TransferEncoding>().unwrap(), TransferEncoding::Base64);
        assert_eq!("raw".parse::<TransferEncoding>().unwrap(), TransferEncoding::Binary);
        assert!("hex".parse::<TransferEncoding>().is_err());
        assert_eq!(TransferEncoding::Base64.to_string(), "base64");
    }

    #[test]
    fn all_round_trip_through_base64() {
        let src_dir = TempDir::new().unwrap();
        let src = storage(&src_dir);
        src.replace_raw("temp", &store_bytes(100, 1.0)).unwrap();
        src.replace_raw("humidity", &store_bytes(200, 2.0)).unwrap();
        std::fs::write(src_dir.path().join("broken.rrd"), b"junk").unwrap();

        let blob = export_all(&src, TransferEncoding::Base64).unwrap();
        assert!(std::str::from_utf8(&blob).is_ok());

        let dst_dir = TempDir::new().unwrap();
        let dst = storage(&dst_dir);
        let names = import_all(&dst, &blob, TransferEncoding::Base64).unwrap();
        assert_eq!(names, vec!["humidity", "temp"]);
        assert_eq!(dst.read_raw("temp").unwrap(), store_bytes(100, 1.0));
        assert!(!dst.registry().exists("broken"));
    }

    #[test]
    fn one_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        storage.replace_raw("temp", &store_bytes(100, 1.0)).unwrap();

        let blob = export_one(&storage, "temp", TransferEncoding::Binary).unwrap();
        assert!(storage.remove("temp").unwrap());
        import_one(&storage, "temp", &blob, TransferEncoding::Binary).unwrap();
        assert_eq!(storage.read_raw("temp").unwrap(), blob);
    }

    #[test]
    fn export_one_of_missing_store() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert!(matches!(
            export_one(&storage, "temp", TransferEncoding::Binary),
            Err(Error::StoreNotFound(_))
        ));
    }

    #[test]
    fn bad_bundle_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let mut writer = BundleWriter::new();
        writer.add_store("good", store_bytes(100, 1.0));
        writer.add_store("bad", b"not a store".to_vec());
        let (bytes, _) = writer.write_to_vec().unwrap();

        assert!(matches!(
            import_all(&storage, &bytes, TransferEncoding::Binary),
            Err(Error::CorruptStore { .. })
        ));
        assert!(storage.registry().list().unwrap().is_empty());
    }

    #[test]
    fn garbage_blob_is_a_bundle_error() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert!(matches!(
            import_all(&storage, b"nope", TransferEncoding::Binary),
            Err(Error::Bundle(_))
        ));
        assert!(matches!(
            import_all(&storage, &[0xff, 0xfe], TransferEncoding::Base64),
            Err(Error::Bundle(_))
        ));
    }

    #[test]
    fn import_one_validates_name_and_bytes() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert!(matches!(
            import_one(&storage, "a/b", &store_bytes(1, 1.0), TransferEncoding::Binary),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            import_one(&storage, "temp", b"junk", TransferEncoding::Binary),
            Err(Error::CorruptStore { .. })
        ));
    }
}
