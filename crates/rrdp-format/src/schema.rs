//! Store schema definitions.
//!
//! A schema is fixed when a store is created and never changes afterwards.
//! Every store carries one data source and a list of archive tiers that all
//! share the store's consolidation function.

use crate::consolidation::ConsolidationFunction;
use crate::error::FormatError;
use serde::{Deserialize, Serialize};

/// Base step of the default schema, in seconds.
pub const DEFAULT_STEP: u64 = 1;

/// Heartbeat of the default data source, in seconds.
pub const DEFAULT_HEARTBEAT: u64 = 60;

/// Name of the single data source.
pub const DEFAULT_DS_NAME: &str = "state";

/// Default x-files factor.
pub const DEFAULT_XFF: f64 = 0.5;

/// Default tiers as `(primary data points per row, rows)`.
///
/// 10 minutes at 1 s, 30 minutes at 5 s, 2 hours at 15 s, 12 hours at 1 min,
/// 5 days at 10 min, 60 days at 2 h.
pub const DEFAULT_TIERS: [(u32, u32); 6] = [
    (1, 600),
    (5, 360),
    (15, 480),
    (60, 720),
    (600, 720),
    (7200, 720),
];

/// The raw data source. Values are treated as gauges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceDef {
    pub name: String,
    /// Longest interval between updates that still yields known data.
    pub heartbeat: u64,
    /// Lower bound; NaN means unbounded.
    pub min: f64,
    /// Upper bound; NaN means unbounded.
    pub max: f64,
}

// Bounds compare bitwise so two unbounded (NaN) sources are equal.
impl PartialEq for DataSourceDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.heartbeat == other.heartbeat
            && self.min.to_bits() == other.min.to_bits()
            && self.max.to_bits() == other.max.to_bits()
    }
}

impl DataSourceDef {
    pub fn unbounded(name: impl Into<String>, heartbeat: u64) -> Self {
        Self {
            name: name.into(),
            heartbeat,
            min: f64::NAN,
            max: f64::NAN,
        }
    }

    /// Whether `value` is a usable sample for this source.
    pub fn accepts(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        if !self.min.is_nan() && value < self.min {
            return false;
        }
        if !self.max.is_nan() && value > self.max {
            return false;
        }
        true
    }
}

/// One archive tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveDef {
    /// Primary data points consolidated into one row.
    pub steps: u32,
    pub rows: u32,
    /// Largest unknown fraction of a row that still yields a value.
    pub xff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSchema {
    /// Base step in seconds.
    pub step: u64,
    pub consolidation: ConsolidationFunction,
    pub data_source: DataSourceDef,
    pub archives: Vec<ArchiveDef>,
}

impl StoreSchema {
    /// The deployment-wide schema used for every new store.
    pub fn default_with(consolidation: ConsolidationFunction) -> Self {
        Self {
            step: DEFAULT_STEP,
            consolidation,
            data_source: DataSourceDef::unbounded(DEFAULT_DS_NAME, DEFAULT_HEARTBEAT),
            archives: DEFAULT_TIERS
                .iter()
                .map(|&(steps, rows)| ArchiveDef {
                    steps,
                    rows,
                    xff: DEFAULT_XFF,
                })
                .collect(),
        }
    }

    /// Seconds covered by one row of archive `index`.
    ///
    /// `None` for a missing archive or a row span that does not fit in `u64`.
    pub fn archive_step(&self, index: usize) -> Option<u64> {
        self.archives
            .get(index)
            .and_then(|arc| self.step.checked_mul(u64::from(arc.steps)))
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        if self.step == 0 {
            return Err(FormatError::InvalidSchema("base step must be positive".into()));
        }
        if self.data_source.heartbeat == 0 {
            return Err(FormatError::InvalidSchema("heartbeat must be positive".into()));
        }
        if self.data_source.name.is_empty() {
            return Err(FormatError::InvalidSchema("data source needs a name".into()));
        }
        if self.archives.is_empty() {
            return Err(FormatError::InvalidSchema("at least one archive is required".into()));
        }
        for (idx, arc) in self.archives.iter().enumerate() {
            if arc.steps == 0 || arc.rows == 0 {
                return Err(FormatError::InvalidSchema(format!(
                    "archive {idx} has zero steps or rows"
                )));
            }
            // Row span and ring horizon must both fit in u64 seconds.
            let horizon = self
                .step
                .checked_mul(u64::from(arc.steps))
                .and_then(|span| span.checked_mul(u64::from(arc.rows)));
            if horizon.is_none() {
                return Err(FormatError::InvalidSchema(format!(
                    "archive {idx} spans more than u64 seconds"
                )));
            }
            if !(0.0..1.0).contains(&arc.xff) {
                return Err(FormatError::InvalidSchema(format!(
                    "archive {idx} xff {} outside [0, 1)",
                    arc.xff
                )));
            }
        }
        Ok(())
    }
}
