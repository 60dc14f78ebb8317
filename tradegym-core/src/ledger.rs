//! Per-instrument position ledger and order-execution primitives.
//!
//! One ledger owns one instrument's position state. Cash is not stored here:
//! it is a single pool shared across all instruments, owned by the aggregator
//! and threaded through the order primitives as `available_cash`. Each
//! operation is called at most once per instrument per simulated day, in the
//! order rebase → sell → buy → mark-to-market.

use crate::domain::OrderSide;
use crate::market::{HistoryStore, MatchingEngine};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller contract violations. The ledger mutates nothing when returning
/// these.
#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("invalid bid price {0}: prices must be finite and non-negative")]
    InvalidPrice(f64),
    #[error("invalid target fraction {0}: must lie in [0, 1]")]
    InvalidTarget(f64),
}

/// Commission applied to traded notional. The default charges nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Fee as a fraction of notional (0.0003 = 3 bps).
    pub rate: f64,
    /// Per-fill floor, only charged when `rate > 0`.
    pub min_fee: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            rate: 0.0,
            min_fee: 0.0,
        }
    }
}

impl CostModel {
    /// Fee for a fill of the given notional, never exceeding the notional
    /// itself so a sell's cash delta stays non-negative.
    pub fn fee(&self, notional: f64) -> f64 {
        if self.rate <= 0.0 {
            0.0
        } else {
            (notional * self.rate).max(self.min_fee).min(notional)
        }
    }
}

/// Position state owned by one ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// Whole shares held; short positions are not representable.
    pub shares: u64,
    /// Total acquisition cost of the open position (commission excluded).
    pub cost_basis: f64,
    pub cumulative_pnl: f64,
    pub cumulative_transaction_cost: f64,
    /// Adjustment factor of the prior processed date; the next session's
    /// rebasing ratio is `factor_on(date) / last_adj_factor`.
    pub last_adj_factor: f64,
}

impl Position {
    fn new() -> Self {
        Self {
            shares: 0,
            cost_basis: 0.0,
            cumulative_pnl: 0.0,
            cumulative_transaction_cost: 0.0,
            last_adj_factor: 1.0,
        }
    }
}

/// The cash/volume effect of one ledger operation. `volume == 0` means no
/// trade happened (rejection or no-op) and the deltas are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeOutcome {
    pub cash_delta: f64,
    pub clearing_price: f64,
    pub volume: u64,
}

impl TradeOutcome {
    const NONE: Self = Self {
        cash_delta: 0.0,
        clearing_price: 0.0,
        volume: 0,
    };
}

/// One trading day's read-only market context.
#[derive(Clone, Copy)]
pub struct MarketView<'a> {
    pub store: &'a HistoryStore,
    pub engine: &'a MatchingEngine,
    pub date: NaiveDate,
}

/// Cash-independent ledger for a single instrument.
#[derive(Debug, Clone)]
pub struct Ledger {
    code: String,
    position: Position,
    cost_model: CostModel,
    /// Position value at the most recent mark-to-market.
    market_value: f64,
    daily_pnl: f64,
    daily_return: f64,
    value_percent: f64,
    /// Commission charged today; cleared by `begin_day`.
    transaction_cost: f64,
}

impl Ledger {
    pub fn new(code: impl Into<String>, cost_model: CostModel) -> Self {
        Self {
            code: code.into(),
            position: Position::new(),
            cost_model,
            market_value: 0.0,
            daily_pnl: 0.0,
            daily_return: 0.0,
            value_percent: 0.0,
            transaction_cost: 0.0,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn shares(&self) -> u64 {
        self.position.shares
    }

    pub fn market_value(&self) -> f64 {
        self.market_value
    }

    pub fn daily_pnl(&self) -> f64 {
        self.daily_pnl
    }

    pub fn daily_return(&self) -> f64 {
        self.daily_return
    }

    pub fn value_percent(&self) -> f64 {
        self.value_percent
    }

    /// Commission charged today.
    pub fn transaction_cost(&self) -> f64 {
        self.transaction_cost
    }

    pub(crate) fn set_last_adj_factor(&mut self, factor: f64) {
        self.position.last_adj_factor = factor;
    }

    pub(crate) fn set_value_percent(&mut self, portfolio_value: f64) {
        self.value_percent = if portfolio_value == 0.0 {
            0.0
        } else {
            self.market_value / portfolio_value
        };
    }

    /// Clear the per-day accumulators before the day's first operation.
    pub(crate) fn begin_day(&mut self) {
        self.transaction_cost = 0.0;
    }

    /// Rebase the share count for a corporate action between sessions.
    ///
    /// Shares scale by `ratio`, rounded to the nearest whole share; cash,
    /// cost basis and cumulative P&L are untouched. A ratio of 1 is a no-op,
    /// so calling twice with 1 is idempotent.
    pub fn rebase(&mut self, ratio: f64) {
        if ratio != 1.0 {
            self.position.shares = ((self.position.shares as f64) * ratio).round() as u64;
        }
    }

    /// Reduce the position toward `target_fraction × portfolio_value` by
    /// selling the whole-share shortfall through the matching engine.
    ///
    /// Returns a zero outcome when the engine rejects or no reduction is
    /// needed; `cash_delta >= 0` otherwise. A target of 0.0 liquidates.
    pub fn sell_to_target(
        &mut self,
        market: &MarketView<'_>,
        target_fraction: f64,
        bid_price: f64,
        portfolio_value: f64,
        _available_cash: f64,
    ) -> Result<TradeOutcome, OrderError> {
        validate_order(bid_price, target_fraction)?;

        let outcome = market.engine.check(
            market.store,
            OrderSide::Sell,
            &self.code,
            market.date,
            bid_price,
        );
        if !outcome.accepted {
            return Ok(TradeOutcome::NONE);
        }
        let price = outcome.clearing_price;

        let desired_value = target_fraction * portfolio_value;
        let desired_shares = (desired_value / price).floor() as u64;
        if desired_shares >= self.position.shares {
            return Ok(TradeOutcome::NONE);
        }

        let volume = self.position.shares - desired_shares;
        let notional = volume as f64 * price;
        let fee = self.cost_model.fee(notional);

        let remaining = self.position.shares - volume;
        if remaining == 0 {
            self.position.cost_basis = 0.0;
        } else {
            // release cost basis proportionally to the shares sold
            self.position.cost_basis *= remaining as f64 / self.position.shares as f64;
        }
        self.position.shares = remaining;
        self.position.cumulative_transaction_cost += fee;
        self.transaction_cost += fee;

        Ok(TradeOutcome {
            cash_delta: notional - fee,
            clearing_price: price,
            volume,
        })
    }

    /// Grow the position toward `target_fraction × portfolio_value` by buying
    /// the whole-share shortfall, with notional plus commission capped at
    /// `available_cash`.
    ///
    /// Returns a zero outcome when the engine rejects or no increase is
    /// needed; `cash_delta <= 0` otherwise. A target of 1.0 is full
    /// allocation.
    pub fn buy_to_target(
        &mut self,
        market: &MarketView<'_>,
        target_fraction: f64,
        bid_price: f64,
        portfolio_value: f64,
        available_cash: f64,
    ) -> Result<TradeOutcome, OrderError> {
        validate_order(bid_price, target_fraction)?;

        let outcome = market.engine.check(
            market.store,
            OrderSide::Buy,
            &self.code,
            market.date,
            bid_price,
        );
        if !outcome.accepted {
            return Ok(TradeOutcome::NONE);
        }
        let price = outcome.clearing_price;
        if price <= 0.0 {
            return Ok(TradeOutcome::NONE);
        }

        let desired_value = target_fraction * portfolio_value;
        let desired_shares = (desired_value / price).floor() as u64;
        if desired_shares <= self.position.shares {
            return Ok(TradeOutcome::NONE);
        }
        let shortfall = desired_shares - self.position.shares;

        let affordable = (available_cash / (price * (1.0 + self.cost_model.rate))).floor() as u64;
        let mut volume = shortfall.min(affordable);
        // a flat minimum fee can push a marginal fill past available cash
        while volume > 0 {
            let notional = volume as f64 * price;
            if notional + self.cost_model.fee(notional) <= available_cash {
                break;
            }
            volume -= 1;
        }
        if volume == 0 {
            return Ok(TradeOutcome::NONE);
        }

        let notional = volume as f64 * price;
        let fee = self.cost_model.fee(notional);

        self.position.shares += volume;
        self.position.cost_basis += notional;
        self.position.cumulative_transaction_cost += fee;
        self.transaction_cost += fee;

        Ok(TradeOutcome {
            cash_delta: -(notional + fee),
            clearing_price: price,
            volume,
        })
    }

    /// Revalue the position at the day's close and book the day's P&L.
    ///
    /// `daily_pnl` is the change in this instrument's market value plus its
    /// own net cash effect today, so summing over instruments gives exactly
    /// the change in total portfolio value. `daily_return` is quoted against
    /// the whole portfolio's pre-trade value (0 when that is 0).
    pub fn mark_to_market(
        &mut self,
        close_price: f64,
        cash_delta_today: f64,
        pre_portfolio_value: f64,
    ) {
        let prev_market_value = self.market_value;
        self.market_value = self.position.shares as f64 * close_price;
        self.daily_pnl = (self.market_value - prev_market_value) + cash_delta_today;
        self.position.cumulative_pnl += self.daily_pnl;
        self.daily_return = if pre_portfolio_value == 0.0 {
            0.0
        } else {
            self.daily_pnl / pre_portfolio_value
        };
    }
}

fn validate_order(bid_price: f64, target_fraction: f64) -> Result<(), OrderError> {
    if !bid_price.is_finite() || bid_price < 0.0 {
        return Err(OrderError::InvalidPrice(bid_price));
    }
    if !target_fraction.is_finite() || !(0.0..=1.0).contains(&target_fraction) {
        return Err(OrderError::InvalidTarget(target_fraction));
    }
    Ok(())
}
