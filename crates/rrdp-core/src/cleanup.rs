//! Delayed deletion of stores whose entity was removed.
//!
//! A removal notice arms a deadline `delay` seconds out. Another notice for
//! the same name before the deadline re-arms it. When the deadline passes,
//! the store is deleted unless the entity registry reports the name present
//! again.
//!
//! [`CleanupScheduler`] is the clock-driven state machine and does no
//! waiting itself. [`CleanupDriver`] owns a thread that sleeps until the
//! next deadline (or the poll interval) and runs whatever is due.

use crate::events::EntityRegistry;
use crate::storage::Storage;
use rrdp_common::Clock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of one name's cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupState {
    None,
    Pending,
    Deleted,
    Cancelled,
}

impl std::fmt::Display for CleanupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CleanupState::None => "none",
            CleanupState::Pending => "pending",
            CleanupState::Deleted => "deleted",
            CleanupState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A cleanup that came due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    pub name: String,
    /// `Deleted` or `Cancelled`.
    pub state: CleanupState,
    /// Whether a store file was actually removed.
    pub removed_file: bool,
}

/// How many settled names keep their terminal state for [`CleanupScheduler::state_of`].
const SETTLED_HISTORY: usize = 1024;

#[derive(Debug, Default)]
struct Timers {
    /// Name to deadline tick.
    pending: HashMap<String, u64>,
    /// Terminal state of names that are no longer pending.
    settled: HashMap<String, CleanupState>,
    /// Keys of `settled`, oldest first.
    settled_order: VecDeque<String>,
}

impl Timers {
    fn settle(&mut self, name: &str, state: CleanupState) {
        if self.settled.insert(name.to_string(), state).is_none() {
            self.settled_order.push_back(name.to_string());
        }
        while self.settled_order.len() > SETTLED_HISTORY {
            if let Some(oldest) = self.settled_order.pop_front() {
                self.settled.remove(&oldest);
            }
        }
    }

    fn unsettle(&mut self, name: &str) {
        if self.settled.remove(name).is_some() {
            self.settled_order.retain(|n| n != name);
        }
    }
}

#[derive(Debug)]
pub struct CleanupScheduler {
    delay: u64,
    timers: Mutex<Timers>,
}

impl CleanupScheduler {
    pub fn new(delay_secs: u64) -> Self {
        Self {
            delay: delay_secs,
            timers: Mutex::new(Timers::default()),
        }
    }

    pub fn delay(&self) -> u64 {
        self.delay
    }

    fn timers(&self) -> std::sync::MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm (or re-arm) the deadline for `name`. Returns the deadline.
    pub fn arm(&self, name: &str, now: u64) -> u64 {
        let deadline = now.saturating_add(self.delay);
        let mut timers = self.timers();
        let rearmed = timers.pending.insert(name.to_string(), deadline).is_some();
        timers.unsettle(name);
        debug!(entity = name, deadline, rearmed, "cleanup armed");
        deadline
    }

    /// Disarm a pending cleanup. Returns whether one was pending.
    pub fn cancel(&self, name: &str) -> bool {
        let mut timers = self.timers();
        if timers.pending.remove(name).is_some() {
            timers.settle(name, CleanupState::Cancelled);
            true
        } else {
            false
        }
    }

    pub fn state_of(&self, name: &str) -> CleanupState {
        let timers = self.timers();
        if timers.pending.contains_key(name) {
            return CleanupState::Pending;
        }
        timers
            .settled
            .get(name)
            .copied()
            .unwrap_or(CleanupState::None)
    }

    /// Names with a pending cleanup, sorted.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.timers().pending.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn deadline_of(&self, name: &str) -> Option<u64> {
        self.timers().pending.get(name).copied()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers().pending.values().min().copied()
    }

    /// Drop every pending cleanup without running it.
    pub fn clear(&self) -> usize {
        let mut timers = self.timers();
        let dropped = timers.pending.len();
        timers.pending.clear();
        dropped
    }

    /// Settle every cleanup whose deadline is at or before `now`.
    ///
    /// Deletion takes the store lock. A failed deletion is logged and the
    /// name still settles as `Deleted`.
    pub fn run_due(
        &self,
        now: u64,
        registry: &dyn EntityRegistry,
        storage: &Storage,
    ) -> Vec<CleanupOutcome> {
        let mut due: Vec<(u64, String)> = {
            let mut timers = self.timers();
            let names: Vec<String> = timers
                .pending
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(name, _)| name.clone())
                .collect();
            names
                .into_iter()
                .filter_map(|name| timers.pending.remove(&name).map(|d| (d, name)))
                .collect()
        };
        due.sort();

        let mut outcomes = Vec::with_capacity(due.len());
        for (_, name) in due {
            let outcome = if registry.exists(&name) {
                info!(entity = %name, "entity is back, keeping its store");
                CleanupOutcome {
                    name,
                    state: CleanupState::Cancelled,
                    removed_file: false,
                }
            } else {
                let removed = match storage.with_lock(&name, || storage.remove(&name)) {
                    Ok(removed) => removed,
                    Err(e) => {
                        warn!(entity = %name, error = %e, "failed to delete store");
                        false
                    }
                };
                info!(entity = %name, removed, "cleanup fired");
                CleanupOutcome {
                    name,
                    state: CleanupState::Deleted,
                    removed_file: removed,
                }
            };
            self.timers().settle(&outcome.name, outcome.state);
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Shared between the engine and the driver thread.
struct DriverShared {
    scheduler: CleanupScheduler,
    storage: Arc<Storage>,
    registry: Arc<dyn EntityRegistry>,
    clock: Arc<dyn Clock>,
    poll: Duration,
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Background thread running a [`CleanupScheduler`].
pub struct CleanupDriver {
    shared: Arc<DriverShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupDriver {
    /// Start the driver thread.
    pub fn start(
        delay_secs: u64,
        poll: Duration,
        storage: Arc<Storage>,
        registry: Arc<dyn EntityRegistry>,
        clock: Arc<dyn Clock>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(DriverShared {
            scheduler: CleanupScheduler::new(delay_secs),
            storage,
            registry,
            clock,
            poll,
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("rrdp-cleanup".to_string())
            .spawn(move || run(worker))?;
        info!(delay_secs, poll_ms = poll.as_millis() as u64, "cleanup driver started");
        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn scheduler(&self) -> &CleanupScheduler {
        &self.shared.scheduler
    }

    /// Arm the cleanup of `name` at the current clock tick.
    pub fn notify_removed(&self, name: &str) -> u64 {
        let deadline = self
            .shared
            .scheduler
            .arm(name, self.shared.clock.now());
        self.shared.wake.notify_all();
        deadline
    }

    /// Stop the thread. Pending cleanups are dropped. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut stop = self.shared.stop.lock().unwrap_or_else(PoisonError::into_inner);
            *stop = true;
        }
        self.shared.wake.notify_all();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("cleanup driver thread panicked");
            }
            let dropped = self.shared.scheduler.clear();
            info!(dropped, "cleanup driver stopped");
        }
    }
}

impl Drop for CleanupDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: Arc<DriverShared>) {
    let mut stop = shared.stop.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        if *stop {
            return;
        }
        let now = shared.clock.now();
        let wait = match shared.scheduler.next_deadline() {
            Some(deadline) if deadline <= now => Duration::ZERO,
            Some(deadline) => shared.poll.min(Duration::from_secs(deadline - now)),
            None => shared.poll,
        };
        if !wait.is_zero() {
            stop = shared
                .wake
                .wait_timeout(stop, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            if *stop {
                return;
            }
        }

        drop(stop);
        shared.scheduler.run_due(
            shared.clock.now(),
            shared.registry.as_ref(),
            &shared.storage,
        );
        stop = shared.stop.lock().unwrap_or_else(PoisonError::into_inner);
    }
}
