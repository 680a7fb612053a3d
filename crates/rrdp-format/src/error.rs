//! Error types for store encoding, decoding and updates.

use thiserror::Error;

/// Errors from store format operations.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a store file (bad magic)")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("store data truncated at offset {0}")]
    Truncated(usize),

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    #[error("integrity digest mismatch")]
    DigestMismatch,

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("update at {requested} is not after last update {last}")]
    NonMonotonic { last: u64, requested: u64 },
}

impl FormatError {
    /// True when the bytes themselves are bad, as opposed to an I/O failure
    /// or a caller mistake.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, FormatError::Io(_) | FormatError::NonMonotonic { .. })
    }
}
