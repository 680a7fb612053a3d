//! Error types for the persistence engine.
//!
//! Errors carry:
//! - Stable error codes for machine parsing
//! - A category following the engine's failure taxonomy
//! - A recoverability hint (may a caller usefully re-invoke?)
//! - A short remediation line for humans
//!
//! # Propagation
//!
//! Per-entity failures never fail whole-collection operations. Only
//! [`Error::UnsupportedQuery`] is surfaced to query callers as a hard
//! rejection; every other query failure degrades to an empty result.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// File create/open/read/write/delete failures.
    Io,
    /// Query shapes this engine cannot serve.
    Query,
    /// Store files that fail to parse, or stores that do not exist.
    Store,
    /// Invalid configuration or invalid entity names.
    Config,
    /// Export/import archive failures.
    Bundle,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Query => write!(f, "query"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Bundle => write!(f, "bundle"),
        }
    }
}

/// Unified error type for the persistence engine.
#[derive(Error, Debug)]
pub enum Error {
    // I/O errors (10-19)
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Query errors (20-29)
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    // Store errors (30-39)
    #[error("corrupt store '{name}': {reason}")]
    CorruptStore { name: String, reason: String },

    #[error("no store for entity '{0}'")]
    StoreNotFound(String),

    #[error("store '{0}' has no time left after its last update")]
    TimeExhausted(String),

    // Configuration errors (40-49)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid entity name {0:?}")]
    InvalidName(String),

    // Bundle errors (50-59)
    #[error("bundle error: {0}")]
    Bundle(String),
}

impl Error {
    /// Build an I/O error tagged with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a corrupt-store error.
    pub fn corrupt(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::CorruptStore {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: I/O errors
    /// - 20-29: Query errors
    /// - 30-39: Store errors
    /// - 40-49: Configuration errors
    /// - 50-59: Bundle errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Io { .. } => 10,
            Error::UnsupportedQuery(_) => 20,
            Error::CorruptStore { .. } => 30,
            Error::StoreNotFound(_) => 31,
            Error::TimeExhausted(_) => 32,
            Error::Config(_) => 40,
            Error::InvalidName(_) => 41,
            Error::Bundle(_) => 50,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io { .. } => ErrorCategory::Io,
            Error::UnsupportedQuery(_) => ErrorCategory::Query,
            Error::CorruptStore { .. } | Error::StoreNotFound(_) | Error::TimeExhausted(_) => {
                ErrorCategory::Store
            }
            Error::Config(_) | Error::InvalidName(_) => ErrorCategory::Config,
            Error::Bundle(_) => ErrorCategory::Bundle,
        }
    }

    /// Returns whether re-invoking the same call could succeed.
    ///
    /// Nothing is retried automatically; this is a hint for callers.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Io { .. } => true,
            // A caller programming error, not a transient condition.
            Error::UnsupportedQuery(_) => false,
            Error::CorruptStore { .. } => false,
            Error::StoreNotFound(_) => true,
            Error::TimeExhausted(_) => false,
            Error::Config(_) => true,
            Error::InvalidName(_) => false,
            Error::Bundle(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Io { .. } => {
                "Check disk space and permissions on the data directory, then retry."
            }
            Error::UnsupportedQuery(_) => {
                "Queries need an entity name, no value filter, and a begin time unless asking for the latest value only."
            }
            Error::CorruptStore { .. } => {
                "Delete the store or import a known-good copy with 'rrdp import <name> <file>'."
            }
            Error::StoreNotFound(_) => "Nothing has been stored for this entity yet.",
            Error::TimeExhausted(_) => {
                "The store's last update is at the largest representable time; delete the store to record again."
            }
            Error::Config(_) => "Check the config file syntax and schema_version.",
            Error::InvalidName(_) => {
                "Entity names may contain ASCII letters, digits, '_' and '-' only."
            }
            Error::Bundle(_) => "The archive is malformed or failed checksum verification.",
        }
    }
}
