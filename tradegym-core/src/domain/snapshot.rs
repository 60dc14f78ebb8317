//! Per-step portfolio snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One instrument's slice of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub code: String,
    pub shares: u64,
    pub market_value: f64,
    /// Share of total portfolio value held in this instrument (0 when the
    /// portfolio is worth nothing).
    pub value_percent: f64,
    pub daily_return: f64,
}

/// Aggregate account state after one simulated day.
///
/// Recomputed every step by the aggregator and never mutated elsewhere.
/// `portfolio_value == market_value + cash` holds at every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub cash: f64,
    pub market_value: f64,
    pub portfolio_value: f64,
    pub daily_pnl: f64,
    /// `daily_pnl / previous portfolio value`, 0 when the denominator is 0.
    pub daily_return: f64,
    /// Commission charged today across all instruments.
    pub transaction_cost: f64,
    /// Cumulative P&L since reset.
    pub total_pnl: f64,
    pub instruments: Vec<InstrumentSummary>,
}

impl Snapshot {
    /// The value-accounting identity every snapshot must satisfy.
    pub fn is_consistent(&self) -> bool {
        (self.portfolio_value - (self.market_value + self.cash)).abs() < 1e-6
    }
}
