//! rrdp common types, clock, and errors.
//!
//! This crate provides foundational types shared across the rrdp crates:
//! - Query specification and result records
//! - The substitutable time source ([`Clock`])
//! - The unified error type with stable codes
//! - Output format specifications

pub mod clock;
pub mod error;
pub mod output;
pub mod query;

pub use clock::{tick_to_datetime, Clock, ManualClock, SystemClock};
pub use error::{Error, ErrorCategory, Result};
pub use output::OutputFormat;
pub use query::{
    HistoricRecord, ItemInfoRecord, Operator, Ordering, QuerySpec, StateFilter,
};
