//! rrdp core library.
//!
//! This library provides the persistence engine:
//! - Store registry and per-store locking
//! - Write path (monotonic time, gap interpolation)
//! - Read path (latest value, paged ranges)
//! - Item-info inventory
//! - Export/import of store files
//! - Debounced cleanup of stores whose entity was removed
//! - Configuration, logging and exit codes for the CLI
//!
//! The binary entry point is in `main.rs`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rrdp_common::{QuerySpec, SystemClock};
//! use rrdp_core::config::EngineConfig;
//! use rrdp_core::events::StaticRegistry;
//! use rrdp_core::PersistenceEngine;
//!
//! let engine = PersistenceEngine::open(
//!     EngineConfig::with_data_dir("/var/lib/rrdp"),
//!     Arc::new(SystemClock),
//!     Arc::new(StaticRegistry::new()),
//! )?;
//! engine.store("temp", 21.5);
//! let latest = engine.query(&QuerySpec::for_entity("temp"))?;
//! # Ok::<(), rrdp_common::Error>(())
//! ```

pub mod cleanup;
pub mod config;
pub mod engine;
pub mod events;
pub mod exit_codes;
pub mod ingest;
pub mod inventory;
pub mod locks;
pub mod logging;
pub mod query;
pub mod registry;
pub mod storage;
pub mod transfer;

pub use cleanup::{CleanupOutcome, CleanupScheduler, CleanupState};
pub use engine::PersistenceEngine;
pub use events::{EntityEvent, EntityEventBus, EntityRegistry, StaticRegistry};
pub use ingest::WriteOutcome;
pub use transfer::TransferEncoding;
