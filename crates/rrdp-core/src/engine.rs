//! The persistence engine façade.
//!
//! [`PersistenceEngine`] owns everything: the service root, per-store locks,
//! the clock, and the cleanup driver. Several engines can coexist in one
//! process as long as they use different data directories.

use crate::cleanup::{CleanupDriver, CleanupState};
use crate::config::{validation, EngineConfig};
use crate::events::{EntityEvent, EntityEventBus, EntityRegistry};
use crate::ingest::{self, WriteOutcome};
use crate::inventory;
use crate::query;
use crate::registry::StoreRegistry;
use crate::storage::Storage;
use crate::transfer::{self, TransferEncoding};
use rrdp_common::{Clock, Error, HistoricRecord, ItemInfoRecord, QuerySpec, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

pub struct PersistenceEngine {
    config: EngineConfig,
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
    cleanup: Option<Arc<CleanupDriver>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl PersistenceEngine {
    /// Open an engine over `config.data_dir`.
    ///
    /// Creating the service root is the only fatal step. Unusable config
    /// values are replaced with defaults first. When cleanup is enabled,
    /// `registry` answers whether a removed entity came back.
    pub fn open(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        registry: Arc<dyn EntityRegistry>,
    ) -> Result<Self> {
        let (config, _) = validation::sanitize(config);
        let store_registry = StoreRegistry::new(&config.data_dir);
        store_registry.ensure_root()?;
        let storage = Arc::new(Storage::new(store_registry));

        let cleanup = if config.cleanup.enabled {
            let driver = CleanupDriver::start(
                config.cleanup.delay_secs,
                Duration::from_millis(config.cleanup.poll_interval_ms),
                Arc::clone(&storage),
                registry,
                Arc::clone(&clock),
            )
            .map_err(|e| Error::io(&config.data_dir, e))?;
            Some(Arc::new(driver))
        } else {
            None
        };

        info!(
            data_dir = %config.data_dir.display(),
            consolidation = %config.consolidation,
            cleanup = config.cleanup.enabled,
            "persistence engine opened"
        );
        Ok(Self {
            config,
            storage,
            clock,
            cleanup,
            listeners: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        self.storage.registry().root()
    }

    pub fn registry(&self) -> &StoreRegistry {
        self.storage.registry()
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Record `value` for `name` now. Failures are logged, never returned.
    pub fn store(&self, name: &str, value: f64) {
        self.store_at(name, value, self.clock.now());
    }

    /// Record `value` for `name` at `time`. Failures are logged, never
    /// returned.
    pub fn store_at(&self, name: &str, value: f64, time: u64) {
        if let Err(e) = self.try_store(name, value, time) {
            warn!(entity = name, time, error = %e, "write dropped");
        }
    }

    /// Record `value` for `name` at `time` and report what happened.
    pub fn try_store(&self, name: &str, value: f64, time: u64) -> Result<WriteOutcome> {
        let _span = info_span!("store", entity = name).entered();
        let outcome = ingest::write_sample(
            &self.storage,
            name,
            value,
            time,
            self.config.consolidation,
        )?;
        debug!(
            recorded_at = outcome.recorded_at,
            interpolated = outcome.interpolated_at.is_some(),
            created = outcome.created,
            "sample stored"
        );
        Ok(outcome)
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Answer `spec`.
    ///
    /// Only `UnsupportedQuery` is returned as an error; every other failure
    /// is logged and yields an empty result.
    pub fn query(&self, spec: &QuerySpec) -> Result<Vec<HistoricRecord>> {
        let name = spec.validate()?;
        let now = self.clock.now();
        let loaded = self.storage.with_lock(name, || {
            self.storage
                .load(name)
                .map(|store| query::answer(&store, name, spec, now))
        });
        match loaded {
            Ok(records) => Ok(records),
            Err(Error::StoreNotFound(_)) => {
                debug!(entity = name, "no store, empty result");
                Ok(Vec::new())
            }
            Err(Error::InvalidName(_)) => {
                debug!(entity = name, "invalid entity name, empty result");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(entity = name, error = %e, "query failed, empty result");
                Ok(Vec::new())
            }
        }
    }

    /// Inventory of every readable store, sorted by name.
    pub fn get_info(&self) -> Result<Vec<ItemInfoRecord>> {
        inventory::collect(&self.storage)
    }

    // ========================================================================
    // Export / import / delete
    // ========================================================================

    pub fn export_all(&self, encoding: TransferEncoding) -> Result<Vec<u8>> {
        transfer::export_all(&self.storage, encoding)
    }

    pub fn export_one(&self, name: &str, encoding: TransferEncoding) -> Result<Vec<u8>> {
        transfer::export_one(&self.storage, name, encoding)
    }

    /// Replace stores from a bundle. Returns the imported names.
    pub fn import_all(&self, blob: &[u8], encoding: TransferEncoding) -> Result<Vec<String>> {
        transfer::import_all(&self.storage, blob, encoding)
    }

    pub fn import_one(&self, name: &str, blob: &[u8], encoding: TransferEncoding) -> Result<()> {
        transfer::import_one(&self.storage, name, blob, encoding)
    }

    /// Delete every store. Returns how many files were removed.
    ///
    /// A store that cannot be deleted is logged and skipped.
    pub fn delete_all(&self) -> Result<usize> {
        let mut deleted = 0;
        for name in self.storage.registry().list()? {
            match self.delete_one(&name) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(entity = %name, error = %e, "failed to delete store"),
            }
        }
        info!(deleted, "deleted all stores");
        Ok(deleted)
    }

    /// Delete the store of `name`. Returns whether one existed.
    pub fn delete_one(&self, name: &str) -> Result<bool> {
        self.storage
            .with_lock(name, || self.storage.remove(name))
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Consume a removal notice for `name`.
    pub fn notify_removed(&self, name: &str) {
        match &self.cleanup {
            Some(driver) if !self.is_closed() => {
                driver.notify_removed(name);
            }
            _ => debug!(entity = name, "removal ignored, cleanup is off"),
        }
    }

    pub fn cleanup_state(&self, name: &str) -> CleanupState {
        self.cleanup
            .as_ref()
            .map(|driver| driver.scheduler().state_of(name))
            .unwrap_or(CleanupState::None)
    }

    pub fn pending_cleanups(&self) -> Vec<String> {
        self.cleanup
            .as_ref()
            .map(|driver| driver.scheduler().pending())
            .unwrap_or_default()
    }

    /// Feed removal events from `bus` into the cleanup scheduler.
    pub fn attach(&self, bus: &EntityEventBus) {
        let Some(driver) = self.cleanup.clone() else {
            debug!("not attaching to event bus, cleanup is off");
            return;
        };
        let rx = bus.subscribe();
        let closed = Arc::clone(&self.closed);
        let poll = Duration::from_millis(self.config.cleanup.poll_interval_ms);
        let spawned = std::thread::Builder::new()
            .name("rrdp-events".to_string())
            .spawn(move || loop {
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                match rx.recv_timeout(poll) {
                    Ok(EntityEvent::Removed(name)) => {
                        driver.notify_removed(&name);
                    }
                    Ok(EntityEvent::Added(name)) => {
                        debug!(entity = %name, "entity added");
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            });
        match spawned {
            Ok(handle) => self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle),
            Err(e) => warn!(error = %e, "failed to start event listener"),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop background threads. Pending cleanups are dropped. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners: Vec<JoinHandle<()>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in listeners {
            if handle.join().is_err() {
                warn!("event listener panicked");
            }
        }
        if let Some(driver) = &self.cleanup {
            driver.shutdown();
        }
        info!(data_dir = %self.data_dir().display(), "persistence engine closed");
    }
}

impl Drop for PersistenceEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PersistenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceEngine")
            .field("data_dir", &self.data_dir())
            .field("consolidation", &self.config.consolidation)
            .field("cleanup", &self.cleanup.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}
