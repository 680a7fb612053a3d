//! Write path.
//!
//! Ingestion never rejects a sample for its timestamp. A time at or before
//! the store's last update is moved to one second after it, and a write
//! after a silence longer than the primary archive step is preceded by a
//! repeat of the last value when the store's consolidation function is not
//! idempotent.

use crate::storage::Storage;
use rrdp_common::{Error, Result};
use rrdp_format::{ConsolidationFunction, FormatError, RoundRobinStore, StoreSchema};
use serde::Serialize;
use tracing::{debug, trace};

/// What a write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WriteOutcome {
    /// Time the sample was recorded at.
    pub recorded_at: u64,
    /// Time of the synthetic repeat of the previous value, if one was written.
    pub interpolated_at: Option<u64>,
    /// Whether the write created the store.
    pub created: bool,
}

/// How a sample will be applied to an existing store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WritePlan {
    pub time: u64,
    /// `(time, value)` of the repeat sample to write first.
    pub interpolation: Option<(u64, f64)>,
}

/// Decide where a sample requested at `requested` lands in `store`.
pub fn plan_write(store: &RoundRobinStore, requested: u64) -> WritePlan {
    let last = store.last_update();
    let time = if requested <= last {
        last.saturating_add(1)
    } else {
        requested
    };

    let primary_step = store.schema().archive_step(0).unwrap_or(store.schema().step);
    let last_value = store.last_value();
    let interpolation = if !store.consolidation().is_idempotent()
        && !last_value.is_nan()
        && time - last > primary_step
    {
        Some((time - 1, last_value))
    } else {
        None
    };

    WritePlan {
        time,
        interpolation,
    }
}

/// Record `value` for `name` at `requested`, creating the store on first use.
///
/// A new store is created with `consolidation`; existing stores keep theirs.
/// The file is rewritten atomically, so on error it keeps its last good
/// contents.
pub fn write_sample(
    storage: &Storage,
    name: &str,
    value: f64,
    requested: u64,
    consolidation: ConsolidationFunction,
) -> Result<WriteOutcome> {
    storage.with_lock(name, || {
        let (mut store, plan, created) = match storage.load_if_present(name)? {
            Some(store) => {
                let plan = plan_write(&store, requested);
                (store, plan, false)
            }
            None => {
                let time = requested.max(1);
                let schema = StoreSchema::default_with(consolidation);
                let store = RoundRobinStore::create(schema, time - 1)
                    .map_err(|e| Error::corrupt(name, e))?;
                debug!(entity = name, start = time - 1, %consolidation, "creating store");
                (
                    store,
                    WritePlan {
                        time,
                        interpolation: None,
                    },
                    true,
                )
            }
        };

        if !created && plan.time <= store.last_update() {
            return Err(Error::TimeExhausted(name.to_string()));
        }
        if plan.time != requested {
            debug!(
                entity = name,
                requested,
                recorded = plan.time,
                "sample moved forward to keep time increasing"
            );
        }
        if let Some((at, repeat)) = plan.interpolation {
            trace!(entity = name, time = at, value = repeat, "repeating last value");
            store.update(at, repeat).map_err(|e| update_error(name, e))?;
        }
        store
            .update(plan.time, value)
            .map_err(|e| update_error(name, e))?;
        storage.save(name, &store)?;

        Ok(WriteOutcome {
            recorded_at: plan.time,
            interpolated_at: plan.interpolation.map(|(at, _)| at),
            created,
        })
    })
}

fn update_error(name: &str, err: FormatError) -> Error {
    match err {
        FormatError::NonMonotonic { .. } => Error::TimeExhausted(name.to_string()),
        other => Error::corrupt(name, other),
    }
}
