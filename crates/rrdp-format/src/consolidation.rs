//! Consolidation functions.
//!
//! Each variant decides how the primary data points landing in one archive
//! row are folded into the row's value. Dispatch is a plain `match`; adding a
//! function means adding a variant and its arms.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsolidationFunction {
    #[default]
    Average,
    Total,
    Min,
    Max,
    Last,
}

impl ConsolidationFunction {
    pub const ALL: [ConsolidationFunction; 5] = [
        ConsolidationFunction::Average,
        ConsolidationFunction::Total,
        ConsolidationFunction::Min,
        ConsolidationFunction::Max,
        ConsolidationFunction::Last,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsolidationFunction::Average => "AVERAGE",
            ConsolidationFunction::Total => "TOTAL",
            ConsolidationFunction::Min => "MIN",
            ConsolidationFunction::Max => "MAX",
            ConsolidationFunction::Last => "LAST",
        }
    }

    /// Whether feeding the same value again leaves the result unchanged.
    ///
    /// `AVERAGE` and `TOTAL` depend on how many samples fell into a row, so a
    /// gap in updates shifts their result.
    pub fn is_idempotent(&self) -> bool {
        match self {
            ConsolidationFunction::Average | ConsolidationFunction::Total => false,
            ConsolidationFunction::Min
            | ConsolidationFunction::Max
            | ConsolidationFunction::Last => true,
        }
    }

    /// Stable on-disk tag.
    pub fn tag(&self) -> u8 {
        match self {
            ConsolidationFunction::Average => 0,
            ConsolidationFunction::Total => 1,
            ConsolidationFunction::Min => 2,
            ConsolidationFunction::Max => 3,
            ConsolidationFunction::Last => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|cf| cf.tag() == tag)
    }

    /// Fold `count` copies of a known value into a running accumulator that
    /// already holds `known` values.
    pub(crate) fn fold(&self, acc: f64, known: u64, value: f64, count: u64) -> f64 {
        if count == 0 {
            return acc;
        }
        if known == 0 {
            return match self {
                ConsolidationFunction::Average | ConsolidationFunction::Total => {
                    value * count as f64
                }
                _ => value,
            };
        }
        match self {
            ConsolidationFunction::Average | ConsolidationFunction::Total => {
                acc + value * count as f64
            }
            ConsolidationFunction::Min => acc.min(value),
            ConsolidationFunction::Max => acc.max(value),
            ConsolidationFunction::Last => value,
        }
    }

    /// Turn an accumulator holding `known` values into the row value.
    pub(crate) fn finish(&self, acc: f64, known: u64, base_step: u64) -> f64 {
        if known == 0 {
            return f64::NAN;
        }
        match self {
            ConsolidationFunction::Average => acc / known as f64,
            ConsolidationFunction::Total => acc * base_step as f64,
            ConsolidationFunction::Min | ConsolidationFunction::Max | ConsolidationFunction::Last => {
                acc
            }
        }
    }
}

impl std::fmt::Display for ConsolidationFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsolidationFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|cf| cf.as_str() == upper)
            .ok_or_else(|| format!("unknown consolidation function '{s}'"))
    }
}
