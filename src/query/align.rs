//! Grid alignment
//!
//! Samples arrive at whatever cadence the store kept them. A series is laid
//! onto the fixed grid `start, start + step, ...` in two passes:
//!
//! 1. Walk the grid and the sorted samples together. Samples older than the
//!    current slot are overtaken and dropped; the first sample inside a slot
//!    that carries the selected field fills it.
//! 2. Interpolate runs of nulls that have a value on both sides. Leading and
//!    trailing nulls stay null.

use crate::backend::Sample;
use crate::query::data_key::{PointValue, ResolvedKey};
use crate::query::error::{QueryError, QueryResult};

/// Latest timestamp a grid bound may take, 9999-12-31T23:59:59Z
pub const MAX_EPOCH_SECONDS: i64 = 253_402_300_799;

/// A fixed-step time grid over `[start, end)`, in epoch seconds
///
/// Bounds are limited to `±MAX_EPOCH_SECONDS` so every slot converts to
/// milliseconds without overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    start: i64,
    end: i64,
    step: i64,
}

impl Grid {
    pub fn new(start: i64, end: i64, step: i64) -> QueryResult<Self> {
        if step <= 0 || step > MAX_EPOCH_SECONDS {
            return Err(QueryError::Configuration(format!(
                "grid step must be between 1 and {}, got {}",
                MAX_EPOCH_SECONDS, step
            )));
        }
        for bound in [start, end] {
            if !(-MAX_EPOCH_SECONDS..=MAX_EPOCH_SECONDS).contains(&bound) {
                return Err(QueryError::InvalidWindow(format!(
                    "time {} is outside +/-{}",
                    bound, MAX_EPOCH_SECONDS
                )));
            }
        }
        Ok(Self { start, end, step })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn start_ms(&self) -> i64 {
        self.start * 1000
    }

    pub fn end_ms(&self) -> i64 {
        self.end * 1000
    }

    /// Number of slots, `ceil((end - start) / step)`
    pub fn len(&self) -> usize {
        if self.end <= self.start {
            return 0;
        }
        let span = self.end - self.start;
        ((span + self.step - 1) / self.step) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of slot `index`, in seconds
    pub fn timestamp(&self, index: usize) -> i64 {
        self.start + index as i64 * self.step
    }
}

/// Lay `samples` onto `grid`, reading each through `key`
pub fn align(samples: &[Sample], grid: &Grid, key: &ResolvedKey) -> Vec<Option<PointValue>> {
    if grid.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<&Sample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);

    let step_ms = grid.step * 1000;
    let mut series = Vec::with_capacity(grid.len());
    let mut next = 0;

    for index in 0..grid.len() {
        let slot_start = grid.timestamp(index) * 1000;
        let slot_end = slot_start + step_ms;

        while next < sorted.len() && sorted[next].timestamp < slot_start {
            next += 1;
        }

        let mut value = None;
        while next < sorted.len() && sorted[next].timestamp < slot_end {
            let sample = sorted[next];
            next += 1;
            if key.exists(sample) {
                value = key.extract(sample).value();
                break;
            }
        }
        series.push(value);
    }

    interpolate_gaps(&mut series);
    series
}

/// Fill interior runs of `None` by linear interpolation
pub fn interpolate_gaps(series: &mut [Option<PointValue>]) {
    let mut last_value: Option<(usize, PointValue)> = None;

    for index in 0..series.len() {
        let Some(current) = series[index] else {
            continue;
        };
        if let Some((previous, before)) = last_value {
            let span = index - previous;
            for position in 1..span {
                series[previous + position] =
                    Some(PointValue::interpolate(before, current, position, span));
            }
        }
        last_value = Some((index, current));
    }
}
