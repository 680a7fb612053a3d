//! The round-robin store.
//!
//! Raw samples feed one gauge data source. The data source turns the time
//! between two updates into primary data points (PDPs), one per base step,
//! and every archive folds `steps` PDPs into one row of its ring buffer.
//!
//! Row timestamps are the end of the interval a row covers and are always
//! multiples of the archive step. Long gaps between updates are consolidated
//! arithmetically, so an update after years of silence costs at most one
//! pass over each ring.

use crate::consolidation::ConsolidationFunction;
use crate::error::FormatError;
use crate::schema::{ArchiveDef, StoreSchema};

/// Raw data source state.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceState {
    /// Time of the last accepted update.
    pub last_update: u64,
    /// Last raw value; NaN when unknown.
    pub last_value: f64,
    /// Value-seconds accumulated in the open PDP.
    pub pdp_value: f64,
    /// Unknown seconds accumulated in the open PDP.
    pub pdp_unknown: u64,
}

/// Ring buffer and consolidation state of one archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveState {
    /// Index of the most recently completed row.
    pub cur_row: u32,
    /// Accumulator for the open row.
    pub acc: f64,
    /// Known PDPs in the open row.
    pub known: u64,
    /// Unknown PDPs in the open row.
    pub unknown: u64,
    pub values: Vec<f64>,
}

impl ArchiveState {
    fn new(def: &ArchiveDef, elapsed_pdps: u64) -> Self {
        Self {
            cur_row: 0,
            acc: 0.0,
            known: 0,
            unknown: elapsed_pdps,
            values: vec![f64::NAN; def.rows as usize],
        }
    }

    fn fold(&mut self, cf: ConsolidationFunction, value: f64, count: u64) {
        if count == 0 {
            return;
        }
        if value.is_nan() {
            self.unknown += count;
        } else {
            self.acc = cf.fold(self.acc, self.known, value, count);
            self.known += count;
        }
    }

    fn row_value(&self, cf: ConsolidationFunction, def: &ArchiveDef, base_step: u64) -> f64 {
        if self.unknown as f64 > def.xff * f64::from(def.steps) {
            f64::NAN
        } else {
            cf.finish(self.acc, self.known, base_step)
        }
    }

    fn advance(&mut self, value: f64) {
        let rows = self.values.len() as u32;
        self.cur_row = (self.cur_row + 1) % rows;
        self.values[self.cur_row as usize] = value;
    }

    /// Feed `count` PDPs of the same value.
    fn consume(
        &mut self,
        cf: ConsolidationFunction,
        def: &ArchiveDef,
        base_step: u64,
        value: f64,
        count: u64,
    ) {
        if count == 0 {
            return;
        }
        let steps = u64::from(def.steps);
        let need = steps - (self.known + self.unknown);
        if count < need {
            self.fold(cf, value, count);
            return;
        }

        self.fold(cf, value, need);
        let closed = self.row_value(cf, def, base_step);
        self.advance(closed);
        self.acc = 0.0;
        self.known = 0;
        self.unknown = 0;

        let remaining = count - need;
        let full_rows = remaining / steps;
        if full_rows > 0 {
            let mut scratch = ArchiveState {
                cur_row: 0,
                acc: 0.0,
                known: 0,
                unknown: 0,
                values: Vec::new(),
            };
            scratch.fold(cf, value, steps);
            let row = scratch.row_value(cf, def, base_step);
            // Past one full lap every row holds the same value.
            for _ in 0..full_rows.min(u64::from(def.rows)) {
                self.advance(row);
            }
        }
        self.fold(cf, value, remaining % steps);
    }
}

/// Time span currently held by one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveBounds {
    pub index: usize,
    /// Seconds per row.
    pub step: u64,
    pub rows: u32,
    /// Timestamp of the oldest row.
    pub start: u64,
    /// Timestamp of the newest completed row.
    pub end: u64,
}

impl ArchiveBounds {
    pub fn contains(&self, time: u64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// A lazily evaluated view of the buckets of one archive inside a time range.
///
/// Bucket `i` has timestamp `first + i * step`. Buckets outside the archive
/// bounds read as NaN.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow<'a> {
    archive: &'a ArchiveState,
    bounds: ArchiveBounds,
    first: u64,
    len: u64,
}

impl<'a> FetchWindow<'a> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn step(&self) -> u64 {
        self.bounds.step
    }

    pub fn bounds(&self) -> ArchiveBounds {
        self.bounds
    }

    pub fn timestamp(&self, i: u64) -> u64 {
        self.first + i * self.bounds.step
    }

    pub fn value(&self, i: u64) -> f64 {
        if i >= self.len {
            return f64::NAN;
        }
        let time = self.timestamp(i);
        if !self.bounds.contains(time) {
            return f64::NAN;
        }
        let back = (self.bounds.end - time) / self.bounds.step;
        let rows = u64::from(self.bounds.rows);
        let idx = (u64::from(self.archive.cur_row) + rows - back) % rows;
        self.archive.values[idx as usize]
    }

    /// All `(timestamp, value)` pairs, NaN included.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        (0..self.len).map(move |i| (self.timestamp(i), self.value(i)))
    }
}

/// One entity's complete time series.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRobinStore {
    schema: StoreSchema,
    ds: DataSourceState,
    archives: Vec<ArchiveState>,
}

impl RoundRobinStore {
    /// Create an empty store whose history begins right after `start`.
    pub fn create(schema: StoreSchema, start: u64) -> Result<Self, FormatError> {
        schema.validate()?;
        let ds = DataSourceState {
            last_update: start,
            last_value: f64::NAN,
            pdp_value: 0.0,
            pdp_unknown: start % schema.step,
        };
        let pdp_index = start / schema.step;
        let archives = schema
            .archives
            .iter()
            .map(|def| ArchiveState::new(def, pdp_index % u64::from(def.steps)))
            .collect();
        Ok(Self {
            schema,
            ds,
            archives,
        })
    }

    /// Reassemble a store from decoded parts, checking they agree.
    pub fn from_parts(
        schema: StoreSchema,
        ds: DataSourceState,
        archives: Vec<ArchiveState>,
    ) -> Result<Self, FormatError> {
        schema.validate()?;
        if archives.len() != schema.archives.len() {
            return Err(FormatError::InvalidState(format!(
                "{} archive states for {} archive definitions",
                archives.len(),
                schema.archives.len()
            )));
        }
        if ds.pdp_unknown > schema.step {
            return Err(FormatError::InvalidState(
                "open PDP has more unknown seconds than the step".into(),
            ));
        }
        for (idx, (def, state)) in schema.archives.iter().zip(&archives).enumerate() {
            if state.values.len() != def.rows as usize || state.cur_row >= def.rows {
                return Err(FormatError::InvalidState(format!(
                    "archive {idx} ring does not match {} rows",
                    def.rows
                )));
            }
            if state.known + state.unknown >= u64::from(def.steps) {
                return Err(FormatError::InvalidState(format!(
                    "archive {idx} open row overflows {} steps",
                    def.steps
                )));
            }
        }
        Ok(Self {
            schema,
            ds,
            archives,
        })
    }

    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    pub fn consolidation(&self) -> ConsolidationFunction {
        self.schema.consolidation
    }

    pub fn data_source(&self) -> &DataSourceState {
        &self.ds
    }

    pub fn archive_states(&self) -> &[ArchiveState] {
        &self.archives
    }

    pub fn last_update(&self) -> u64 {
        self.ds.last_update
    }

    pub fn last_value(&self) -> f64 {
        self.ds.last_value
    }

    /// Record `value` at `time`. `time` must be after the last update.
    pub fn update(&mut self, time: u64, value: f64) -> Result<(), FormatError> {
        let last = self.ds.last_update;
        if time <= last {
            return Err(FormatError::NonMonotonic {
                last,
                requested: time,
            });
        }
        let step = self.schema.step;
        let heartbeat = self.schema.data_source.heartbeat;
        let valid = self.schema.data_source.accepts(value);
        let known = valid && time - last <= heartbeat;

        // A step boundary past u64::MAX is never reached.
        let pdp_end = (last / step + 1).checked_mul(step).filter(|&end| time >= end);
        if let Some(pdp_end) = pdp_end {
            self.accumulate(value, pdp_end - last, known);
            let closed = self.close_pdp();
            let boundary = time / step * step;
            let full = (boundary - pdp_end) / step;
            let fill = if known { value } else { f64::NAN };

            let cf = self.schema.consolidation;
            for (def, arc) in self.schema.archives.iter().zip(self.archives.iter_mut()) {
                arc.consume(cf, def, step, closed, 1);
                arc.consume(cf, def, step, fill, full);
            }

            self.ds.pdp_value = 0.0;
            self.ds.pdp_unknown = 0;
            self.accumulate(value, time - boundary, known);
        } else {
            self.accumulate(value, time - last, known);
        }

        self.ds.last_update = time;
        self.ds.last_value = if valid { value } else { f64::NAN };
        Ok(())
    }

    fn accumulate(&mut self, value: f64, secs: u64, known: bool) {
        if known {
            self.ds.pdp_value += value * secs as f64;
        } else {
            self.ds.pdp_unknown += secs;
        }
    }

    fn close_pdp(&self) -> f64 {
        if self.ds.pdp_unknown > self.schema.data_source.heartbeat {
            return f64::NAN;
        }
        let known_secs = self.schema.step.saturating_sub(self.ds.pdp_unknown);
        if known_secs == 0 {
            f64::NAN
        } else {
            self.ds.pdp_value / known_secs as f64
        }
    }

    /// Bounds of archive `index`, derived from the last update time.
    pub fn archive_bounds(&self, index: usize) -> Option<ArchiveBounds> {
        let def = self.schema.archives.get(index)?;
        let step = self.schema.archive_step(index)?;
        let end = self.ds.last_update / step * step;
        let start = end.saturating_sub(u64::from(def.rows.saturating_sub(1)).saturating_mul(step));
        Some(ArchiveBounds {
            index,
            step,
            rows: def.rows,
            start,
            end,
        })
    }

    /// Bounds of the first (finest) archive.
    pub fn primary_bounds(&self) -> ArchiveBounds {
        // `from_parts`/`create` guarantee at least one archive.
        self.archive_bounds(0).unwrap_or(ArchiveBounds {
            index: 0,
            step: self.schema.step,
            rows: 0,
            start: 0,
            end: 0,
        })
    }

    /// Buckets of archive `index` in `[begin, end]`.
    pub fn archive_window(&self, index: usize, begin: u64, end: u64) -> Option<FetchWindow<'_>> {
        let bounds = self.archive_bounds(index)?;
        let archive = self.archives.get(index)?;
        let first = begin
            .div_ceil(bounds.step)
            .checked_mul(bounds.step)
            .unwrap_or(u64::MAX);
        let len = if first > end || begin > end {
            0
        } else {
            (end - first) / bounds.step + 1
        };
        Some(FetchWindow {
            archive,
            bounds,
            first,
            len,
        })
    }

    /// Buckets in `[begin, end]` from the best archive consolidated with `cf`.
    ///
    /// Picks the finest archive that reaches back to `begin`; when none does,
    /// the one reaching back furthest. Returns `None` when no archive uses
    /// `cf`.
    pub fn fetch(
        &self,
        cf: ConsolidationFunction,
        begin: u64,
        end: u64,
    ) -> Option<FetchWindow<'_>> {
        if cf != self.schema.consolidation {
            return None;
        }
        let all: Vec<ArchiveBounds> = (0..self.archives.len())
            .filter_map(|i| self.archive_bounds(i))
            .collect();
        let chosen = all
            .iter()
            .filter(|b| b.start <= begin)
            .min_by_key(|b| b.step)
            .or_else(|| all.iter().min_by_key(|b| (b.start, b.step)))?;
        self.archive_window(chosen.index, begin, end)
    }
}
