//! Price-limit order matching against daily bars.
//!
//! The model is deliberately optimistic and symmetric: any bid inside the
//! day's `[low, high]` range fills. It does not model that a fully-invested
//! account bidding exactly the low-of-day tick may fail to clear in live
//! trading; backtests built on this engine inherit that bias.

use crate::domain::OrderSide;
use crate::market::history::HistoryStore;
use chrono::NaiveDate;

/// Default board limit threshold, in percent units.
///
/// Main-board stocks cap daily moves at ±10%; 9.8 registers both the 10%
/// class and the 9.8% class as locked.
pub const DEFAULT_LIMIT_PCT: f64 = 9.8;

/// Why an order did not fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The date is absent from the instrument's history.
    Suspended,
    /// Single-price session locked at the cap: limit-up blocks buys,
    /// limit-down blocks sells.
    LimitLocked,
    /// Bid below the day's low (buy) or above the day's high (sell).
    PriceAway,
}

/// Result of one matching attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub accepted: bool,
    /// 0.0 when not accepted.
    pub clearing_price: f64,
    pub reject: Option<RejectReason>,
}

impl MatchOutcome {
    fn filled(clearing_price: f64) -> Self {
        Self {
            accepted: true,
            clearing_price,
            reject: None,
        }
    }

    fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            clearing_price: 0.0,
            reject: Some(reason),
        }
    }
}

/// Matching engine for a restricted-liquidity daily-bar exchange.
#[derive(Debug, Clone, Copy)]
pub struct MatchingEngine {
    limit_pct: f64,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT_PCT)
    }
}

impl MatchingEngine {
    pub fn new(limit_pct: f64) -> Self {
        Self { limit_pct }
    }

    pub fn limit_pct(&self) -> f64 {
        self.limit_pct
    }

    /// Decide fill eligibility and clearing price for one order.
    ///
    /// Rejections are not errors: the caller treats them as "no fill today"
    /// and must leave cash and position untouched.
    pub fn check(
        &self,
        store: &HistoryStore,
        side: OrderSide,
        code: &str,
        date: NaiveDate,
        bid_price: f64,
    ) -> MatchOutcome {
        let Some(bar) = store.history(code).and_then(|h| h.bar(date)) else {
            return MatchOutcome::rejected(RejectReason::Suspended);
        };

        match side {
            OrderSide::Buy => {
                if bar.is_single_price() && bar.pct_change > self.limit_pct {
                    return MatchOutcome::rejected(RejectReason::LimitLocked);
                }
                if bid_price < bar.low {
                    return MatchOutcome::rejected(RejectReason::PriceAway);
                }
                // a generous bid pays no more than the day's high
                MatchOutcome::filled(bid_price.min(bar.high))
            }
            OrderSide::Sell => {
                if bar.is_single_price() && bar.pct_change < -self.limit_pct {
                    return MatchOutcome::rejected(RejectReason::LimitLocked);
                }
                if bid_price > bar.high {
                    return MatchOutcome::rejected(RejectReason::PriceAway);
                }
                // an ask below the low still realizes at least the low
                MatchOutcome::filled(bid_price.max(bar.low))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DailyBar;
    use std::collections::HashMap;

    const CODE: &str = "000001.SZ";

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store_with(bar: DailyBar) -> HistoryStore {
        let mut bars = HashMap::new();
        bars.insert(CODE.to_string(), vec![bar]);
        HistoryStore::from_bars(bars)
    }

    fn normal_bar() -> DailyBar {
        DailyBar {
            date: d("2019-10-21"),
            open: 16.5,
            high: 16.9,
            low: 16.3,
            close: 16.66,
            pre_close: 16.45,
            pct_change: 1.28,
            adj_factor: 1.0,
        }
    }

    fn locked_bar(pct_change: f64, price: f64) -> DailyBar {
        DailyBar {
            date: d("2019-10-21"),
            open: price,
            high: price,
            low: price,
            close: price,
            pre_close: price / (1.0 + pct_change / 100.0),
            pct_change,
            adj_factor: 1.0,
        }
    }

    #[test]
    fn suspended_date_rejects_both_sides() {
        let store = store_with(normal_bar());
        let engine = MatchingEngine::default();
        for side in [OrderSide::Buy, OrderSide::Sell] {
            let out = engine.check(&store, side, CODE, d("2019-10-22"), 16.5);
            assert!(!out.accepted);
            assert_eq!(out.clearing_price, 0.0);
            assert_eq!(out.reject, Some(RejectReason::Suspended));
        }
    }

    #[test]
    fn unknown_code_is_treated_as_suspended() {
        let store = store_with(normal_bar());
        let out = MatchingEngine::default().check(
            &store,
            OrderSide::Buy,
            "999999.SZ",
            d("2019-10-21"),
            16.5,
        );
        assert_eq!(out.reject, Some(RejectReason::Suspended));
    }

    #[test]
    fn locked_limit_up_blocks_buys_not_sells() {
        let store = store_with(locked_bar(10.02, 18.1));
        let engine = MatchingEngine::default();

        let buy = engine.check(&store, OrderSide::Buy, CODE, d("2019-10-21"), 20.0);
        assert_eq!(buy.reject, Some(RejectReason::LimitLocked));

        // holders can still exit into a locked limit-up book
        let sell = engine.check(&store, OrderSide::Sell, CODE, d("2019-10-21"), 17.0);
        assert!(sell.accepted);
        assert_eq!(sell.clearing_price, 18.1);
    }

    #[test]
    fn locked_limit_down_blocks_sells_regardless_of_ask() {
        let store = store_with(locked_bar(-9.97, 14.9));
        let engine = MatchingEngine::default();

        for ask in [0.01, 10.0, 14.9] {
            let sell = engine.check(&store, OrderSide::Sell, CODE, d("2019-10-21"), ask);
            assert_eq!(sell.reject, Some(RejectReason::LimitLocked));
        }

        let buy = engine.check(&store, OrderSide::Buy, CODE, d("2019-10-21"), 14.9);
        assert!(buy.accepted);
    }

    #[test]
    fn single_price_session_inside_limit_still_trades() {
        // low == high but the move is small (thin book, not a locked cap)
        let store = store_with(locked_bar(0.5, 16.5));
        let engine = MatchingEngine::default();
        assert!(engine.check(&store, OrderSide::Buy, CODE, d("2019-10-21"), 16.5).accepted);
        assert!(engine.check(&store, OrderSide::Sell, CODE, d("2019-10-21"), 16.5).accepted);
    }

    #[test]
    fn buy_below_low_rejected() {
        let store = store_with(normal_bar());
        let out = MatchingEngine::default().check(
            &store,
            OrderSide::Buy,
            CODE,
            d("2019-10-21"),
            16.29,
        );
        assert_eq!(out.reject, Some(RejectReason::PriceAway));
    }

    #[test]
    fn generous_buy_caps_at_high() {
        let store = store_with(normal_bar());
        let out = MatchingEngine::default().check(
            &store,
            OrderSide::Buy,
            CODE,
            d("2019-10-21"),
            18.0,
        );
        assert!(out.accepted);
        assert_eq!(out.clearing_price, 16.9);
    }

    #[test]
    fn buy_at_exact_low_fills_at_bid() {
        let store = store_with(normal_bar());
        let out = MatchingEngine::default().check(
            &store,
            OrderSide::Buy,
            CODE,
            d("2019-10-21"),
            16.3,
        );
        assert!(out.accepted);
        assert_eq!(out.clearing_price, 16.3);
    }

    #[test]
    fn sell_above_high_rejected() {
        let store = store_with(normal_bar());
        let out = MatchingEngine::default().check(
            &store,
            OrderSide::Sell,
            CODE,
            d("2019-10-21"),
            17.5,
        );
        assert_eq!(out.reject, Some(RejectReason::PriceAway));
    }

    #[test]
    fn desperate_sell_realizes_at_least_the_low() {
        let store = store_with(normal_bar());
        let out = MatchingEngine::default().check(
            &store,
            OrderSide::Sell,
            CODE,
            d("2019-10-21"),
            10.0,
        );
        assert!(out.accepted);
        assert_eq!(out.clearing_price, 16.3);
    }
}
