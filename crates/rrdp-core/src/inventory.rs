//! Item-info summaries.

use crate::storage::Storage;
use rrdp_common::{ItemInfoRecord, Result};
use rrdp_format::RoundRobinStore;
use tracing::warn;

/// Summary of `store`'s primary archive.
pub fn item_info(name: &str, store: &RoundRobinStore) -> ItemInfoRecord {
    let bounds = store.primary_bounds();
    ItemInfoRecord {
        name: name.to_string(),
        count: u64::from(bounds.rows),
        earliest: bounds.start,
        latest: bounds.end,
    }
}

/// Summaries of every readable store, sorted by name.
///
/// A store that fails to load is logged and left out.
pub fn collect(storage: &Storage) -> Result<Vec<ItemInfoRecord>> {
    let names = storage.registry().list()?;
    let mut records = Vec::with_capacity(names.len());
    for name in names {
        match storage.with_lock(&name, || storage.load(&name)) {
            Ok(store) => records.push(item_info(&name, &store)),
            Err(e) => warn!(entity = %name, error = %e, "skipping unreadable store"),
        }
    }
    Ok(records)
}
