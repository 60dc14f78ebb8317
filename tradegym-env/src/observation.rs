//! Observation assembly: rolling lookback windows of market features plus
//! account state.
//!
//! Market features are split-adjusted (raw price × adjustment factor) so the
//! series a model sees is continuous across corporate actions, while all
//! trading decisions elsewhere run on raw prices.

use tradegym_core::domain::DailyBar;
use tradegym_core::market::HistoryStore;

pub const BAR_FEATURES: usize = 5;
pub const ACCOUNT_FEATURES: usize = 2;
/// `[adj_open, adj_high, adj_low, adj_close, pct_change, daily_return, value_percent]`
pub const ROW_WIDTH: usize = BAR_FEATURES + ACCOUNT_FEATURES;

/// Per-instrument rolling windows, each `look_back_days` rows deep. The
/// oldest row drops off as each new day is pushed.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    windows: Vec<Vec<[f64; ROW_WIDTH]>>,
}

impl Observation {
    pub(crate) fn zeroed(n_instruments: usize, look_back_days: usize) -> Self {
        Self {
            windows: vec![vec![[0.0; ROW_WIDTH]; look_back_days]; n_instruments],
        }
    }

    pub fn windows(&self) -> &[Vec<[f64; ROW_WIDTH]>] {
        &self.windows
    }

    pub fn window(&self, instrument: usize) -> &[[f64; ROW_WIDTH]] {
        &self.windows[instrument]
    }

    /// Rotate one instrument's window: drop the oldest row, append the new.
    pub(crate) fn push_row(&mut self, instrument: usize, row: [f64; ROW_WIDTH]) {
        let window = &mut self.windows[instrument];
        window.remove(0);
        window.push(row);
    }

    /// All windows flattened row-major into one feature vector.
    pub fn flatten(&self) -> Vec<f64> {
        self.windows
            .iter()
            .flat_map(|w| w.iter().flat_map(|row| row.iter().copied()))
            .collect()
    }
}

/// Feature row for one instrument-day: adjusted OHLC, percent change, and
/// the account columns.
pub(crate) fn bar_row(bar: &DailyBar, daily_return: f64, value_percent: f64) -> [f64; ROW_WIDTH] {
    let f = bar.adj_factor;
    [
        bar.open * f,
        bar.high * f,
        bar.low * f,
        bar.close * f,
        bar.pct_change,
        daily_return,
        value_percent,
    ]
}

/// Build the pre-episode window from the lookback dates. Days an instrument
/// did not trade carry the latest earlier bar forward; days before its first
/// bar are zero rows. Account columns start flat at zero.
pub(crate) fn initial(
    store: &HistoryStore,
    codes: &[String],
    lookback_dates: &[chrono::NaiveDate],
) -> Observation {
    let mut obs = Observation::zeroed(codes.len(), lookback_dates.len());
    for (i, code) in codes.iter().enumerate() {
        for (row_idx, &date) in lookback_dates.iter().enumerate() {
            if let Some(bar) = store.history(code).and_then(|h| h.bar_at_or_before(date)) {
                obs.windows[i][row_idx] = bar_row(bar, 0.0, 0.0);
            }
        }
    }
    obs
}
