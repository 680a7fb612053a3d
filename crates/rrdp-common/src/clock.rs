//! Time source abstraction.
//!
//! All engine time is an integer tick in whole seconds since the Unix epoch.
//! Production code uses [`SystemClock`]; tests drive [`ManualClock`] so that
//! write-path and cleanup behavior is deterministic.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies the current time as a tick (seconds).
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    tick: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            tick: AtomicU64::new(start),
        }
    }

    pub fn set(&self, tick: u64) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    /// Move forward by `secs` and return the new tick.
    pub fn advance(&self, secs: u64) -> u64 {
        self.tick.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }
}

/// Convert a tick to a UTC timestamp. Out-of-range ticks map to the epoch.
pub fn tick_to_datetime(tick: u64) -> DateTime<Utc> {
    i64::try_from(tick)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(DateTime::UNIX_EPOCH)
}
