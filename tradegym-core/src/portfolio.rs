//! Portfolio aggregation: the simulation state machine over trading days.
//!
//! `TradingSim` is the explicit owned state of one episode: the shared cash
//! pool, one ledger per instrument in fixed code order, the matching engine
//! and the cost model. The history store is read-only and passed in by
//! reference per call. One simulated day runs rebase → all sells → all buys →
//! mark-to-market → aggregate, fully, before the next begins; days must be
//! stepped in calendar order.
//!
//! Sells across ALL instruments precede buys across ALL instruments. This is
//! the canonical contract, not an accident: a sell can never fail for lack of
//! post-buy cash, and a buy may spend same-day proceeds from another
//! instrument's sell.

use crate::domain::{Fill, InstrumentSummary, OrderSide, Snapshot};
use crate::ledger::{CostModel, Ledger, MarketView, OrderError, TradeOutcome};
use crate::market::{adjuster, HistoryStore, MarketError, MatchingEngine};
use chrono::NaiveDate;
use thiserror::Error;

/// One instrument's intents for a single day: sell first, then buy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentOrder {
    pub sell_price: f64,
    pub sell_target: f64,
    pub buy_price: f64,
    pub buy_target: f64,
}

impl InstrumentOrder {
    fn validate(&self) -> Result<(), OrderError> {
        for price in [self.sell_price, self.buy_price] {
            if !price.is_finite() || price < 0.0 {
                return Err(OrderError::InvalidPrice(price));
            }
        }
        for target in [self.sell_target, self.buy_target] {
            if !target.is_finite() || !(0.0..=1.0).contains(&target) {
                return Err(OrderError::InvalidTarget(target));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StepError {
    #[error("episode is done; reset before stepping again")]
    EpisodeDone,
    #[error("expected {expected} instrument orders, got {got}")]
    OrderCount { expected: usize, got: usize },
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Market(#[from] MarketError),
}

/// Everything one day produces: the aggregate snapshot plus the ordered list
/// of accepted fills.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub snapshot: Snapshot,
    pub fills: Vec<Fill>,
}

/// Owned simulation state: shared cash pool plus one ledger per instrument.
#[derive(Debug, Clone)]
pub struct TradingSim {
    engine: MatchingEngine,
    cost_model: CostModel,
    codes: Vec<String>,
    ledgers: Vec<Ledger>,
    starting_cash: f64,
    cash: f64,
    portfolio_value: f64,
    total_pnl: f64,
    done: bool,
}

impl TradingSim {
    pub fn new(
        codes: Vec<String>,
        investment: f64,
        engine: MatchingEngine,
        cost_model: CostModel,
    ) -> Self {
        let ledgers = codes
            .iter()
            .map(|c| Ledger::new(c.clone(), cost_model))
            .collect();
        Self {
            engine,
            cost_model,
            codes,
            ledgers,
            starting_cash: investment,
            cash: investment,
            portfolio_value: investment,
            total_pnl: 0.0,
            done: false,
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn portfolio_value(&self) -> f64 {
        self.portfolio_value
    }

    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn ledgers(&self) -> &[Ledger] {
        &self.ledgers
    }

    pub fn ledger(&self, code: &str) -> Option<&Ledger> {
        self.ledgers.iter().find(|l| l.code() == code)
    }

    /// Start a fresh episode whose first tradable session is `first_date`.
    ///
    /// Positions are emptied, cash returns to the initial investment, and
    /// every ledger's adjustment factor is seeded from the most recent record
    /// strictly before `first_date` so the first day's rebase ratio is well
    /// defined. Fails with `MissingHistory` for an instrument that never
    /// traded before `first_date`. Calling reset twice in a row yields
    /// identical snapshots.
    pub fn reset(
        &mut self,
        store: &HistoryStore,
        first_date: NaiveDate,
    ) -> Result<Snapshot, StepError> {
        self.ledgers = self
            .codes
            .iter()
            .map(|c| Ledger::new(c.clone(), self.cost_model))
            .collect();
        for ledger in &mut self.ledgers {
            let factor = adjuster::factor_before(store, ledger.code(), first_date)?;
            ledger.set_last_adj_factor(factor);
        }
        self.cash = self.starting_cash;
        self.portfolio_value = self.starting_cash;
        self.total_pnl = 0.0;
        self.done = false;

        Ok(Snapshot {
            date: first_date,
            cash: self.cash,
            market_value: 0.0,
            portfolio_value: self.portfolio_value,
            daily_pnl: 0.0,
            daily_return: 0.0,
            transaction_cost: 0.0,
            total_pnl: 0.0,
            instruments: self
                .ledgers
                .iter()
                .map(|l| InstrumentSummary {
                    code: l.code().to_string(),
                    shares: 0,
                    market_value: 0.0,
                    value_percent: 0.0,
                    daily_return: 0.0,
                })
                .collect(),
        })
    }

    /// Process one simulated day.
    ///
    /// `orders` holds one entry per instrument in code order; `None` applies
    /// mark-to-market only (the buy-and-hold baseline). Invalid orders fail
    /// atomically before any ledger is touched.
    pub fn step(
        &mut self,
        store: &HistoryStore,
        date: NaiveDate,
        orders: Option<&[InstrumentOrder]>,
    ) -> Result<StepOutcome, StepError> {
        if self.done {
            return Err(StepError::EpisodeDone);
        }
        if let Some(orders) = orders {
            if orders.len() != self.ledgers.len() {
                return Err(StepError::OrderCount {
                    expected: self.ledgers.len(),
                    got: orders.len(),
                });
            }
            for order in orders {
                order.validate()?;
            }
        }

        let pre_portfolio_value = self.portfolio_value;
        let n = self.ledgers.len();

        // corporate actions first: rebase every position before any matching
        for ledger in &mut self.ledgers {
            ledger.begin_day();
            let factor = adjuster::factor_on(store, ledger.code(), date)?;
            let ratio = factor / ledger.position().last_adj_factor;
            ledger.rebase(ratio);
            ledger.set_last_adj_factor(factor);
        }

        let mut fills = Vec::new();
        let mut cash_deltas = vec![0.0; n];

        if let Some(orders) = orders {
            let engine = self.engine;
            let market = MarketView {
                store,
                engine: &engine,
                date,
            };

            // all sells, in code order
            for i in 0..n {
                let outcome = self.ledgers[i].sell_to_target(
                    &market,
                    orders[i].sell_target,
                    orders[i].sell_price,
                    pre_portfolio_value,
                    self.cash,
                )?;
                self.book_fill(OrderSide::Sell, i, outcome, &mut cash_deltas, &mut fills);
            }

            // then all buys, spending any same-day sale proceeds
            for i in 0..n {
                let outcome = self.ledgers[i].buy_to_target(
                    &market,
                    orders[i].buy_target,
                    orders[i].buy_price,
                    pre_portfolio_value,
                    self.cash,
                )?;
                self.book_fill(OrderSide::Buy, i, outcome, &mut cash_deltas, &mut fills);
            }
        }

        // mark every instrument at the day's (carry-forward) close
        for (i, ledger) in self.ledgers.iter_mut().enumerate() {
            let close = store.close_on(ledger.code(), date)?;
            ledger.mark_to_market(close, cash_deltas[i], pre_portfolio_value);
        }

        let market_value: f64 = self.ledgers.iter().map(|l| l.market_value()).sum();
        let daily_pnl: f64 = self.ledgers.iter().map(|l| l.daily_pnl()).sum();
        let transaction_cost: f64 = self.ledgers.iter().map(|l| l.transaction_cost()).sum();

        self.portfolio_value = market_value + self.cash;
        self.total_pnl += daily_pnl;
        for ledger in &mut self.ledgers {
            ledger.set_value_percent(self.portfolio_value);
        }

        let daily_return = if pre_portfolio_value == 0.0 {
            0.0
        } else {
            daily_pnl / pre_portfolio_value
        };

        if Some(date) == store.last_open_date() {
            self.done = true;
        }

        let snapshot = Snapshot {
            date,
            cash: self.cash,
            market_value,
            portfolio_value: self.portfolio_value,
            daily_pnl,
            daily_return,
            transaction_cost,
            total_pnl: self.total_pnl,
            instruments: self
                .ledgers
                .iter()
                .map(|l| InstrumentSummary {
                    code: l.code().to_string(),
                    shares: l.shares(),
                    market_value: l.market_value(),
                    value_percent: l.value_percent(),
                    daily_return: l.daily_return(),
                })
                .collect(),
        };

        Ok(StepOutcome { snapshot, fills })
    }

    fn book_fill(
        &mut self,
        side: OrderSide,
        index: usize,
        outcome: TradeOutcome,
        cash_deltas: &mut [f64],
        fills: &mut Vec<Fill>,
    ) {
        if outcome.volume == 0 {
            return;
        }
        self.cash += outcome.cash_delta;
        cash_deltas[index] += outcome.cash_delta;
        fills.push(Fill {
            side,
            code: self.codes[index].clone(),
            cash_delta: outcome.cash_delta,
            clearing_price: outcome.clearing_price,
            volume: outcome.volume,
        });
    }
}
