//! End-to-end engine tests against real store files.
//!
//! Every test opens a `PersistenceEngine` over a fresh temp directory and
//! drives time with a `ManualClock`.

use rrdp_common::{HistoricRecord, ManualClock, Ordering, QuerySpec};
use rrdp_core::config::EngineConfig;
use rrdp_core::{PersistenceEngine, StaticRegistry, TransferEncoding};
use rrdp_format::{ArchiveDef, ConsolidationFunction, DataSourceDef, RoundRobinStore, StoreSchema};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn open(dir: &TempDir, cf: ConsolidationFunction, clock: Arc<ManualClock>) -> PersistenceEngine {
    let config = EngineConfig::with_data_dir(dir.path().join("rrd")).with_consolidation(cf);
    PersistenceEngine::open(config, clock, Arc::new(StaticRegistry::new())).unwrap()
}

fn values(records: &[HistoricRecord]) -> Vec<(u64, f64)> {
    records.iter().map(|r| (r.timestamp, r.value)).collect()
}

// ============================================================================
// Write path
// ============================================================================

#[test]
fn out_of_order_write_is_recorded_after_last() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));

    let first = engine.try_store("temp", 20.0, 100).unwrap();
    assert_eq!(first.recorded_at, 100);
    assert!(first.created);

    let second = engine.try_store("temp", 22.0, 50).unwrap();
    assert_eq!(second.recorded_at, 101);

    let latest = engine.query(&QuerySpec::for_entity("temp")).unwrap();
    assert_eq!(latest, vec![HistoricRecord::new("temp", 22.0, 101)]);
}

#[test]
fn equal_timestamps_still_increase() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Last, Arc::new(ManualClock::new(0)));
    let recorded: Vec<u64> = (0..4)
        .map(|i| engine.try_store("temp", f64::from(i), 500).unwrap().recorded_at)
        .collect();
    assert_eq!(recorded, vec![500, 501, 502, 503]);
}

#[test]
fn gap_writes_one_repeat_for_average() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));

    engine.try_store("temp", 20.0, 100).unwrap();
    let outcome = engine.try_store("temp", 30.0, 110).unwrap();
    assert_eq!(outcome.interpolated_at, Some(109));
    assert_eq!(outcome.recorded_at, 110);

    // The silent seconds carry the previous value, not the new one.
    let spec = QuerySpec::for_entity("temp").with_range(101, 110).with_page(0, 10);
    let records = engine.query(&spec).unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0], HistoricRecord::new("temp", 30.0, 110));
    assert!(records[1..].iter().all(|r| r.value == 20.0));
}

#[test]
fn gap_writes_no_repeat_for_max() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Max, Arc::new(ManualClock::new(0)));

    engine.try_store("temp", 20.0, 100).unwrap();
    let outcome = engine.try_store("temp", 30.0, 110).unwrap();
    assert_eq!(outcome.interpolated_at, None);

    let spec = QuerySpec::for_entity("temp").with_range(105, 105);
    assert_eq!(
        values(&engine.query(&spec).unwrap()),
        vec![(105, 30.0)]
    );
}

#[test]
fn concurrent_writers_never_collide() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(open(
        &dir,
        ConsolidationFunction::Average,
        Arc::new(ManualClock::new(0)),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                (0..10)
                    .map(|j| {
                        engine
                            .try_store("temp", f64::from(i * 10 + j), 1_000)
                            .unwrap()
                            .recorded_at
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut recorded: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    recorded.sort_unstable();
    recorded.dedup();
    assert_eq!(recorded.len(), 80);
    assert_eq!(recorded, (1_000..1_080).collect::<Vec<_>>());
}

// ============================================================================
// Read path
// ============================================================================

fn five_samples(engine: &PersistenceEngine) {
    for (i, v) in [10.0, 20.0, 30.0, 40.0, 50.0].into_iter().enumerate() {
        engine.try_store("temp", v, 101 + i as u64).unwrap();
    }
}

#[test]
fn ascending_page_returns_earliest() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    five_samples(&engine);

    let spec = QuerySpec::for_entity("temp")
        .with_range(101, 105)
        .with_page(0, 2)
        .with_ordering(Ordering::Ascending);
    assert_eq!(
        values(&engine.query(&spec).unwrap()),
        vec![(101, 10.0), (102, 20.0)]
    );
}

#[test]
fn descending_page_returns_latest_in_reverse() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    five_samples(&engine);

    let spec = QuerySpec::for_entity("temp")
        .with_range(101, 105)
        .with_page(0, 2)
        .with_ordering(Ordering::Descending);
    assert_eq!(
        values(&engine.query(&spec).unwrap()),
        vec![(105, 50.0), (104, 40.0)]
    );
}

#[test]
fn open_ended_range_stops_at_clock() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(103));
    let engine = open(&dir, ConsolidationFunction::Average, clock.clone());
    five_samples(&engine);

    let spec = QuerySpec::for_entity("temp")
        .with_begin(101)
        .with_page(0, 10)
        .with_ordering(Ordering::Ascending);
    assert_eq!(engine.query(&spec).unwrap().len(), 3);

    clock.set(200);
    assert_eq!(engine.query(&spec).unwrap().len(), 5);
}

#[test]
fn latest_without_data_is_empty() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    assert!(engine.query(&QuerySpec::for_entity("temp")).unwrap().is_empty());

    engine.try_store("temp", f64::NAN, 100).unwrap();
    assert!(engine.query(&QuerySpec::for_entity("temp")).unwrap().is_empty());
}

// ============================================================================
// Inventory, export/import
// ============================================================================

#[test]
fn info_lists_stores_sorted() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    engine.try_store("zeta", 1.0, 5_000).unwrap();
    engine.try_store("alpha", 1.0, 6_000).unwrap();
    std::fs::write(engine.registry().locate("broken"), b"junk").unwrap();

    let info = engine.get_info().unwrap();
    let names: Vec<_> = info.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(info[0].count, 600);
    assert_eq!(info[0].latest, 6_000);
    assert_eq!(info[0].earliest, 6_000 - 599);
}

#[test]
fn export_delete_import_reproduces_history() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    five_samples(&engine);

    let spec = QuerySpec::for_entity("temp").with_range(90, 110).with_page(0, 50);
    let before_query = engine.query(&spec).unwrap();
    let before_info = engine.get_info().unwrap();

    let blob = engine.export_one("temp", TransferEncoding::Binary).unwrap();
    assert!(engine.delete_one("temp").unwrap());
    assert!(engine.query(&spec).unwrap().is_empty());

    engine.import_one("temp", &blob, TransferEncoding::Binary).unwrap();
    assert_eq!(engine.query(&spec).unwrap(), before_query);
    assert_eq!(engine.get_info().unwrap(), before_info);
}

#[test]
fn bundle_moves_between_engines() {
    let src_dir = TempDir::new().unwrap();
    let src = open(&src_dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    five_samples(&src);
    src.try_store("humidity", 55.0, 300).unwrap();

    let blob = src.export_all(TransferEncoding::Base64).unwrap();

    let dst_dir = TempDir::new().unwrap();
    let dst = open(&dst_dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    dst.try_store("temp", 99.0, 50).unwrap();
    let imported = dst.import_all(&blob, TransferEncoding::Base64).unwrap();
    assert_eq!(imported, vec!["humidity", "temp"]);

    let latest = dst.query(&QuerySpec::for_entity("temp")).unwrap();
    assert_eq!(latest, vec![HistoricRecord::new("temp", 50.0, 105)]);
    assert_eq!(dst.get_info().unwrap(), src.get_info().unwrap());
}

#[test]
fn engines_on_separate_dirs_are_independent() {
    let a_dir = TempDir::new().unwrap();
    let b_dir = TempDir::new().unwrap();
    let a = open(&a_dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    let b = open(&b_dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    a.try_store("temp", 1.0, 100).unwrap();
    assert!(b.query(&QuerySpec::for_entity("temp")).unwrap().is_empty());
    assert_eq!(b.delete_all().unwrap(), 0);
    assert_eq!(a.get_info().unwrap().len(), 1);
}

// ============================================================================
// Hostile store files
// ============================================================================

/// A store whose single archive spans 2^64 seconds per row, re-digested so
/// only schema validation can catch it.
fn oversized_store_bytes() -> Vec<u8> {
    let schema = StoreSchema {
        step: 1 << 40,
        consolidation: ConsolidationFunction::Average,
        data_source: DataSourceDef::unbounded("state", 60),
        archives: vec![ArchiveDef {
            steps: 1,
            rows: 2,
            xff: 0.5,
        }],
    };
    let mut body = rrdp_format::encode(&RoundRobinStore::create(schema, 0).unwrap());
    body.truncate(body.len() - 32);
    let at = 4 + 2 + 8 + 1 + 2 + "state".len() + 8 + 8 + 8 + 2;
    body[at..at + 4].copy_from_slice(&(1u32 << 24).to_le_bytes());
    let digest = Sha256::digest(&body);
    body.extend_from_slice(&digest);
    body
}

#[test]
fn oversized_schema_import_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    engine.try_store("temp", 1.0, 100).unwrap();

    let result = engine.import_one("evil", &oversized_store_bytes(), TransferEncoding::Binary);
    assert!(matches!(result, Err(rrdp_common::Error::CorruptStore { .. })));
    assert!(!engine.registry().exists("evil"));
}

#[test]
fn oversized_schema_on_disk_is_skipped() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ConsolidationFunction::Average, Arc::new(ManualClock::new(0)));
    engine.try_store("temp", 1.0, 100).unwrap();
    std::fs::write(engine.registry().locate("evil"), oversized_store_bytes()).unwrap();

    let names: Vec<_> = engine
        .get_info()
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["temp"]);

    let spec = QuerySpec::for_entity("evil").with_range(0, 100).with_page(0, 10);
    assert!(engine.query(&spec).unwrap().is_empty());
    assert!(engine.query(&QuerySpec::for_entity("evil")).unwrap().is_empty());
}
