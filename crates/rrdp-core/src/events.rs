//! Entity lifecycle events and the existence predicate.
//!
//! Removal events feed the cleanup scheduler; the [`EntityRegistry`]
//! answers whether a name is present again when a cleanup comes due.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{mpsc, Mutex, PoisonError};

/// Something happened to an entity in the owning system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum EntityEvent {
    Added(String),
    Removed(String),
}

impl EntityEvent {
    pub fn name(&self) -> &str {
        match self {
            EntityEvent::Added(name) | EntityEvent::Removed(name) => name,
        }
    }
}

/// Broadcast bus for entity events.
#[derive(Debug, Default)]
pub struct EntityEventBus {
    senders: Mutex<Vec<mpsc::Sender<EntityEvent>>>,
}

impl EntityEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all events published from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<EntityEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber. Dropped receivers are pruned.
    pub fn publish(&self, event: EntityEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Existence predicate of the owning system's entity registry.
pub trait EntityRegistry: Send + Sync {
    fn exists(&self, name: &str) -> bool;
}

impl<F> EntityRegistry for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn exists(&self, name: &str) -> bool {
        self(name)
    }
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    names: Mutex<HashSet<String>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Mutex::new(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn add(&self, name: impl Into<String>) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Apply an event to the registry's view.
    pub fn apply(&self, event: &EntityEvent) {
        match event {
            EntityEvent::Added(name) => self.add(name.clone()),
            EntityEvent::Removed(name) => {
                self.remove(name);
            }
        }
    }
}

impl EntityRegistry for StaticRegistry {
    fn exists(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }
}
