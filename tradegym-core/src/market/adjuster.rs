//! Corporate-action adjustment: split/dividend rebasing between sessions.
//!
//! The adjustment factor is a cumulative multiplier; the ratio of the factors
//! of two consecutive sessions is the rebasing ratio applied to share counts
//! before any order matching that day. Lookups carry the most recent earlier
//! record forward across suspensions and never interpolate.

use crate::market::history::{HistoryStore, MarketError};
use chrono::NaiveDate;

/// Adjustment factor effective on `date`, carrying forward across
/// suspensions.
pub fn factor_on(store: &HistoryStore, code: &str, date: NaiveDate) -> Result<f64, MarketError> {
    store
        .history(code)
        .and_then(|h| h.bar_at_or_before(date))
        .map(|b| b.adj_factor)
        .ok_or_else(|| MarketError::MissingHistory {
            code: code.to_string(),
            date,
        })
}

/// Adjustment factor of the most recent session strictly before `date`.
///
/// Fails with `MissingHistory` when the instrument never traded before
/// `date` — an episode cannot proceed for such an instrument.
pub fn factor_before(store: &HistoryStore, code: &str, date: NaiveDate) -> Result<f64, MarketError> {
    store
        .history(code)
        .and_then(|h| h.bar_before(date))
        .map(|b| b.adj_factor)
        .ok_or_else(|| MarketError::MissingHistory {
            code: code.to_string(),
            date,
        })
}

/// Split/dividend rebasing ratio between `date` and the previous session.
///
/// A ratio of 1 means no corporate action; a 2:1 split reads 2.0. Applied
/// multiplicatively to shares it leaves `shares × close` economically
/// unchanged modulo the action.
pub fn rebase_ratio(store: &HistoryStore, code: &str, date: NaiveDate) -> Result<f64, MarketError> {
    let current = factor_on(store, code, date)?;
    let previous = factor_before(store, code, date)?;
    Ok(current / previous)
}
