//! DailyBar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily bar for a single instrument on a single trading date.
///
/// Prices are raw (unadjusted) exchange prices; `adj_factor` is the cumulative
/// split/dividend multiplier that converts them to an adjusted series. The
/// ratio of two consecutive factors is the rebasing ratio for share counts.
/// `pct_change` is in percent units: a +10% board-limit day reads `10.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub pre_close: f64,
    pub pct_change: f64,
    pub adj_factor: f64,
}

impl DailyBar {
    /// True when the session traded at a single price from open to close.
    ///
    /// On a board with daily price limits this means the book was locked at
    /// the cap for the whole session; combined with `pct_change` it tells
    /// limit-up from limit-down.
    pub fn is_single_price(&self) -> bool {
        self.low == self.high
    }

    /// Basic OHLC sanity check: positive prices, `low <= open,close <= high`,
    /// and a positive adjustment factor.
    pub fn is_sane(&self) -> bool {
        let finite = [
            self.open,
            self.high,
            self.low,
            self.close,
            self.pre_close,
            self.pct_change,
            self.adj_factor,
        ]
        .iter()
        .all(|v| v.is_finite());

        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.adj_factor > 0.0
    }
}
