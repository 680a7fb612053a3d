//! Store files on a real filesystem.

use rrdp_format::{
    read_store, temp_path_for, write_bytes, write_store, ConsolidationFunction, FormatError,
    RoundRobinStore, StoreSchema, STORE_EXTENSION,
};
use std::fs;
use tempfile::TempDir;

fn store_with(cf: ConsolidationFunction, samples: &[(u64, f64)]) -> RoundRobinStore {
    let first = samples.first().map(|(t, _)| *t).unwrap_or(1);
    let mut store = RoundRobinStore::create(StoreSchema::default_with(cf), first - 1).unwrap();
    for (t, v) in samples {
        store.update(*t, *v).unwrap();
    }
    store
}

#[test]
fn reopened_store_keeps_schema_and_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(format!("temp.{STORE_EXTENSION}"));
    let store = store_with(ConsolidationFunction::Min, &[(100, 3.0), (101, 1.0)]);
    write_store(&path, &store).unwrap();

    let mut reopened = read_store(&path).unwrap();
    assert_eq!(reopened.schema(), store.schema());
    assert_eq!(reopened.last_update(), 101);

    reopened.update(102, 0.5).unwrap();
    write_store(&path, &reopened).unwrap();
    let again = read_store(&path).unwrap();
    assert_eq!(again.last_value(), 0.5);
    assert_eq!(again.consolidation(), ConsolidationFunction::Min);
}

#[test]
fn truncated_file_reads_as_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("temp.rrd");
    write_store(&path, &store_with(ConsolidationFunction::Average, &[(10, 1.0)])).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    let err = read_store(&path).unwrap_err();
    assert!(err.is_corruption(), "{err}");
}

#[test]
fn replacing_leaves_no_temp_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("humidity.rrd");
    fs::write(&path, b"old").unwrap();

    let store = store_with(ConsolidationFunction::Last, &[(50, 42.0)]);
    write_store(&path, &store).unwrap();

    assert!(!temp_path_for(&path).exists());
    assert_eq!(read_store(&path).unwrap().last_value(), 42.0);
}

#[test]
fn raw_bytes_can_be_installed_verbatim() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("a.rrd");
    let dst = dir.path().join("b.rrd");
    write_store(&src, &store_with(ConsolidationFunction::Max, &[(7, 7.0)])).unwrap();

    write_bytes(&dst, &fs::read(&src).unwrap()).unwrap();
    assert_eq!(fs::read(&src).unwrap(), fs::read(&dst).unwrap());
}

#[test]
fn write_into_missing_parent_creates_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("persistence").join("rrd").join("x.rrd");
    write_store(&path, &store_with(ConsolidationFunction::Total, &[(2, 1.0)])).unwrap();
    assert!(path.exists());
}

#[test]
fn unreadable_path_is_io_not_corruption() {
    let dir = TempDir::new().unwrap();
    // A directory where a file is expected.
    let err = read_store(dir.path()).unwrap_err();
    assert!(matches!(err, FormatError::Io(_)));
}
