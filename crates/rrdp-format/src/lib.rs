//! rrdp round-robin store format.
//!
//! This crate provides:
//! - Consolidation functions and the fixed store schema
//! - The in-memory round-robin store (update, bounds, fetch)
//! - A checksummed binary codec
//! - Crash-safe store file replacement

pub mod codec;
pub mod consolidation;
pub mod error;
pub mod file;
pub mod schema;
pub mod store;

pub use codec::{decode, encode, FORMAT_VERSION, MAGIC};
pub use consolidation::ConsolidationFunction;
pub use error::FormatError;
pub use file::{read_store, temp_path_for, write_bytes, write_store};
pub use schema::{ArchiveDef, DataSourceDef, StoreSchema, DEFAULT_TIERS};
pub use store::{ArchiveBounds, ArchiveState, DataSourceState, FetchWindow, RoundRobinStore};

/// File extension of store files.
pub const STORE_EXTENSION: &str = "rrd";
