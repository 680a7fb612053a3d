//! Query specification and result records.

use crate::clock::tick_to_datetime;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Result ordering for ranged queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordering {
    Ascending,
    #[default]
    Descending,
}

impl Ordering {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ordering::Ascending => "asc",
            Ordering::Descending => "desc",
        }
    }
}

impl std::fmt::Display for Ordering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ordering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Ordering::Ascending),
            "desc" | "descending" => Ok(Ordering::Descending),
            other => Err(format!("unknown ordering '{other}' (expected asc or desc)")),
        }
    }
}

/// Comparison operator of a value filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Value-based filter. Round-robin stores cannot serve these; a query
/// carrying one is always rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFilter {
    pub operator: Operator,
    pub value: f64,
}

/// What a caller wants back from one entity's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub entity_name: Option<String>,
    /// Absent begin means "latest value only".
    pub begin: Option<u64>,
    /// Absent end means "now".
    pub end: Option<u64>,
    pub page_number: u32,
    pub page_size: u32,
    pub ordering: Ordering,
    pub state_filter: Option<StateFilter>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            entity_name: None,
            begin: None,
            end: None,
            page_number: 0,
            page_size: 1,
            ordering: Ordering::Descending,
            state_filter: None,
        }
    }
}

impl QuerySpec {
    /// Latest-value query for `name`.
    pub fn for_entity(name: impl Into<String>) -> Self {
        Self {
            entity_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_begin(mut self, begin: u64) -> Self {
        self.begin = Some(begin);
        self
    }

    pub fn with_end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_range(self, begin: u64, end: u64) -> Self {
        self.with_begin(begin).with_end(end)
    }

    pub fn with_page(mut self, page_number: u32, page_size: u32) -> Self {
        self.page_number = page_number;
        self.page_size = page_size;
        self
    }

    pub fn with_ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_state_filter(mut self, filter: StateFilter) -> Self {
        self.state_filter = Some(filter);
        self
    }

    /// True when page, size and ordering are exactly the defaults.
    pub fn has_default_paging(&self) -> bool {
        self.page_number == 0 && self.page_size == 1 && self.ordering == Ordering::Descending
    }

    /// Reject query shapes the engine cannot serve.
    ///
    /// Returns the entity name on success.
    pub fn validate(&self) -> Result<&str> {
        let name = match self.entity_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(Error::UnsupportedQuery(
                    "an entity name is required".to_string(),
                ))
            }
        };
        if self.state_filter.is_some() {
            return Err(Error::UnsupportedQuery(
                "value filters are not supported".to_string(),
            ));
        }
        if self.begin.is_none() && !self.has_default_paging() {
            return Err(Error::UnsupportedQuery(
                "a query without begin time may only ask for the latest value (page 0, size 1, desc)"
                    .to_string(),
            ));
        }
        Ok(name)
    }
}

/// One historic value of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricRecord {
    pub entity_name: String,
    pub value: f64,
    pub timestamp: u64,
}

impl HistoricRecord {
    pub fn new(entity_name: impl Into<String>, value: f64, timestamp: u64) -> Self {
        Self {
            entity_name: entity_name.into(),
            value,
            timestamp,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        tick_to_datetime(self.timestamp)
    }
}

/// Inventory summary of one store's primary archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfoRecord {
    pub name: String,
    /// Row capacity of the primary archive.
    pub count: u64,
    pub earliest: u64,
    pub latest: u64,
}

impl ItemInfoRecord {
    pub fn earliest_time(&self) -> DateTime<Utc> {
        tick_to_datetime(self.earliest)
    }

    pub fn latest_time(&self) -> DateTime<Utc> {
        tick_to_datetime(self.latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_latest_only() {
        let spec = QuerySpec::for_entity("temp");
        assert!(spec.has_default_paging());
        assert_eq!(spec.validate().unwrap(), "temp");
    }

    #[test]
    fn missing_entity_is_rejected() {
        let err = QuerySpec::default().validate().unwrap_err();
        assert!(matches!(err, Error::UnsupportedQuery(_)));

        let err = QuerySpec::for_entity("").validate().unwrap_err();
        assert!(matches!(err, Error::UnsupportedQuery(_)));
    }

    #[test]
    fn state_filter_is_rejected() {
        let spec = QuerySpec::for_entity("temp")
            .with_begin(0)
            .with_state_filter(StateFilter {
                operator: Operator::Gt,
                value: 1.0,
            });
        assert!(matches!(
            spec.validate().unwrap_err(),
            Error::UnsupportedQuery(_)
        ));
    }

    #[test]
    fn no_begin_with_custom_paging_is_rejected() {
        for spec in [
            QuerySpec::for_entity("t").with_page(1, 1),
            QuerySpec::for_entity("t").with_page(0, 10),
            QuerySpec::for_entity("t").with_ordering(Ordering::Ascending),
        ] {
            assert!(spec.validate().is_err(), "{spec:?}");
        }
    }

    #[test]
    fn begin_allows_any_paging() {
        let spec = QuerySpec::for_entity("t")
            .with_range(10, 20)
            .with_page(3, 50)
            .with_ordering(Ordering::Ascending);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn ordering_parses_both_spellings() {
        assert_eq!("asc".parse::<Ordering>().unwrap(), Ordering::Ascending);
        assert_eq!("DESCENDING".parse::<Ordering>().unwrap(), Ordering::Descending);
        assert!("sideways".parse::<Ordering>().is_err());
        assert_eq!(Ordering::default().to_string(), "desc");
    }

    #[test]
    fn historic_record_serializes_snake_case() {
        let record = HistoricRecord::new("temp", 20.5, 100);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["entity_name"], "temp");
        assert_eq!(json["timestamp"], 100);
        assert_eq!(record.time().timestamp(), 100);
    }
}
