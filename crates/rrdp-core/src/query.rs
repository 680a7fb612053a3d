//! Read path.
//!
//! A query without begin time reads the data source's last value directly.
//! A ranged query pages over the archive buckets in `[begin, end]`; paging
//! counts buckets, and NaN buckets are dropped from the page afterwards.

use rrdp_common::{HistoricRecord, Ordering, QuerySpec};
use rrdp_format::RoundRobinStore;

/// Answer `spec` from `store`. `now` stands in for an absent end time.
///
/// `spec` must already have passed [`QuerySpec::validate`].
pub fn answer(store: &RoundRobinStore, name: &str, spec: &QuerySpec, now: u64) -> Vec<HistoricRecord> {
    match spec.begin {
        None => latest(store, name),
        Some(begin) => ranged(store, name, spec, begin, spec.end.unwrap_or(now)),
    }
}

fn latest(store: &RoundRobinStore, name: &str) -> Vec<HistoricRecord> {
    let value = store.last_value();
    if value.is_nan() {
        return Vec::new();
    }
    vec![HistoricRecord::new(name, value, store.last_update())]
}

fn ranged(
    store: &RoundRobinStore,
    name: &str,
    spec: &QuerySpec,
    begin: u64,
    end: u64,
) -> Vec<HistoricRecord> {
    let Some(window) = store.fetch(store.consolidation(), begin, end) else {
        return Vec::new();
    };
    let len = window.len();
    let size = u64::from(spec.page_size);
    let skip = u64::from(spec.page_number).saturating_mul(size);
    if skip >= len {
        return Vec::new();
    }
    let take_end = skip.saturating_add(size).min(len);

    (skip..take_end)
        .map(|k| match spec.ordering {
            Ordering::Ascending => k,
            Ordering::Descending => len - k - 1,
        })
        .filter_map(|i| {
            let value = window.value(i);
            (!value.is_nan()).then(|| HistoricRecord::new(name, value, window.timestamp(i)))
        })
        .collect()
}
