//! Time-ordered train/test split
//!
//! The log is cut at a single position: everything before it trains, the
//! contiguous suffix after it tests. Rows are never shuffled or sampled.

use std::ops::Range;

use crate::{ForecastError, Result, SplitConfig};

/// Split boundary over an ordered table of `total` rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalSplit {
    /// First test row
    pub start: usize,
    pub total: usize,
}

impl TemporalSplit {
    /// `start = total - max(1, round(total * test_fraction))`
    ///
    /// A trailing-row request can only move `start` earlier:
    /// `start = min(start, total - trailing)`, clamped at 0. Halves round to
    /// even.
    pub fn compute(
        total: usize,
        test_fraction: f64,
        trailing_row_override: Option<usize>,
    ) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ForecastError::InvalidArgument(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }
        if total == 0 {
            return Err(ForecastError::InsufficientData {
                available: 0,
                required: 1,
            });
        }

        let n_test = ((total as f64 * test_fraction).round_ties_even() as usize)
            .max(1)
            .min(total);
        let mut start = total - n_test;

        if let Some(trailing) = trailing_row_override {
            start = start.min(total.saturating_sub(trailing));
        }

        Ok(TemporalSplit { start, total })
    }

    pub fn from_config(total: usize, config: &SplitConfig) -> Result<Self> {
        Self::compute(total, config.test_fraction, config.trailing_row_override)
    }

    pub fn n_train(&self) -> usize {
        self.start
    }

    pub fn n_test(&self) -> usize {
        self.total - self.start
    }

    pub fn test_range(&self) -> Range<usize> {
        self.start..self.total
    }

    /// Cut a slice of exactly `total` items into (train, test)
    pub fn apply<'a, T>(&self, items: &'a [T]) -> Result<(&'a [T], &'a [T])> {
        if items.len() != self.total {
            return Err(ForecastError::InvalidArgument(format!(
                "split computed for {} rows, got {}",
                self.total,
                items.len()
            )));
        }
        Ok(items.split_at(self.start))
    }
}
