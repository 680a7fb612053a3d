//! Per-store mutual exclusion.
//!
//! Every operation touching one entity's file runs under that entity's
//! lock. Different entities never contend beyond the brief map lookup.
//! A name's entry lives only while some caller holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct StoreLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StoreLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the lock for `name`.
    ///
    /// A poisoned lock is taken over; store files are replaced atomically
    /// so a panicking holder cannot have left one half-written.
    pub fn with<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(name);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(name, &handle);
        result
    }

    /// Drop the entry for `name` unless another caller still holds a handle.
    fn release(&self, name: &str, handle: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(name)
            .is_some_and(|entry| Arc::ptr_eq(entry, handle) && Arc::strong_count(entry) == 2);
        if idle {
            locks.remove(name);
        }
    }

    /// Number of names currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
