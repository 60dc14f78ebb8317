//! Property tests for exchange and ledger invariants.
//!
//! Uses proptest to verify:
//! 1. Cash conservation — accepted fills account for every unit of cash moved
//! 2. Rejection neutrality — a rejected order leaves position and cash untouched
//! 3. Price-bound fills — clearing prices stay inside the day's range
//! 4. Rebase neutrality — rebasing scales shares and nothing else

use chrono::NaiveDate;
use proptest::array::uniform5;
use proptest::prelude::*;
use std::collections::HashMap;
use tradegym_core::domain::{DailyBar, OrderSide};
use tradegym_core::ledger::{CostModel, Ledger, MarketView};
use tradegym_core::market::{HistoryStore, MatchingEngine};
use tradegym_core::portfolio::{InstrumentOrder, TradingSim};

const CODES: [&str; 2] = ["000001.SZ", "600000.SH"];

fn d(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 10, 18).unwrap() + chrono::Duration::days(offset as i64)
}

/// Two instruments, five sessions each, no corporate actions.
fn store_from_closes(closes: &[[f64; 5]; 2]) -> HistoryStore {
    let mut bars = HashMap::new();
    for (c, code) in CODES.iter().enumerate() {
        let mut rows = Vec::new();
        let mut prev = closes[c][0];
        for (i, &close) in closes[c].iter().enumerate() {
            let high = close.max(prev) * 1.02;
            let low = close.min(prev) * 0.98;
            rows.push(DailyBar {
                date: d(i as u64),
                open: prev,
                high,
                low,
                close,
                pre_close: prev,
                pct_change: (close / prev - 1.0) * 100.0,
                adj_factor: 1.0,
            });
            prev = close;
        }
        bars.insert(code.to_string(), rows);
    }
    HistoryStore::from_bars(bars)
}

fn arb_close() -> impl Strategy<Value = f64> {
    (5.0..50.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_closes() -> impl Strategy<Value = [[f64; 5]; 2]> {
    (uniform5(arb_close()), uniform5(arb_close())).prop_map(|(a, b)| [a, b])
}

fn arb_order() -> impl Strategy<Value = InstrumentOrder> {
    (5.0..60.0_f64, 0.0..=1.0_f64, 5.0..60.0_f64, 0.0..=1.0_f64).prop_map(
        |(sell_price, sell_target, buy_price, buy_target)| InstrumentOrder {
            sell_price,
            sell_target,
            buy_price,
            buy_target,
        },
    )
}

// ── 1. Cash conservation ─────────────────────────────────────────────

proptest! {
    /// Over a full episode of arbitrary orders, the sum of all fills' cash
    /// deltas equals the net cash movement, and cash never goes negative.
    #[test]
    fn cash_conservation(
        closes in arb_closes(),
        orders in prop::collection::vec((arb_order(), arb_order()), 4),
    ) {
        let store = store_from_closes(&closes);
        let mut sim = TradingSim::new(
            CODES.iter().map(|c| c.to_string()).collect(),
            100_000.0,
            MatchingEngine::default(),
            CostModel { rate: 0.0003, min_fee: 5.0 },
        );
        sim.reset(&store, d(1)).unwrap();

        let cash_before = sim.cash();
        let mut delta_sum = 0.0;
        for (i, (a, b)) in orders.iter().enumerate() {
            let out = sim.step(&store, d(1 + i as u64), Some(&[*a, *b])).unwrap();
            for fill in &out.fills {
                delta_sum += fill.cash_delta;
            }
            prop_assert!(sim.cash() >= -1e-9, "cash went negative: {}", sim.cash());
            prop_assert!(out.snapshot.is_consistent());
        }
        prop_assert!(
            (cash_before + delta_sum - sim.cash()).abs() < 1e-6,
            "cash leaked: before={cash_before} deltas={delta_sum} after={}",
            sim.cash()
        );
    }
}

// ── 2. Rejection neutrality ──────────────────────────────────────────

proptest! {
    /// Bids placed outside the day's range are rejected and leave the whole
    /// account unchanged.
    #[test]
    fn rejection_neutrality(closes in arb_closes()) {
        let store = store_from_closes(&closes);
        let mut sim = TradingSim::new(
            CODES.iter().map(|c| c.to_string()).collect(),
            100_000.0,
            MatchingEngine::default(),
            CostModel::default(),
        );
        sim.reset(&store, d(1)).unwrap();

        // bids no session can satisfy: buys far below every low, sells far
        // above every high
        let hopeless = InstrumentOrder {
            sell_price: 1_000.0,
            sell_target: 0.0,
            buy_price: 0.01,
            buy_target: 1.0,
        };
        let out = sim.step(&store, d(1), Some(&[hopeless, hopeless])).unwrap();

        prop_assert!(out.fills.is_empty());
        prop_assert_eq!(sim.cash(), 100_000.0);
        for summary in &out.snapshot.instruments {
            prop_assert_eq!(summary.shares, 0);
        }
    }
}

// ── 3. Price-bound fills ─────────────────────────────────────────────

proptest! {
    /// Every accepted buy clears in [low, min(bid, high)]; every accepted
    /// sell clears in [max(bid, low), high].
    #[test]
    fn fills_clear_inside_the_days_range(
        closes in arb_closes(),
        orders in prop::collection::vec((arb_order(), arb_order()), 4),
    ) {
        let store = store_from_closes(&closes);
        let mut sim = TradingSim::new(
            CODES.iter().map(|c| c.to_string()).collect(),
            100_000.0,
            MatchingEngine::default(),
            CostModel::default(),
        );
        sim.reset(&store, d(1)).unwrap();

        for (i, (a, b)) in orders.iter().enumerate() {
            let date = d(1 + i as u64);
            let submitted = [*a, *b];
            let out = sim.step(&store, date, Some(&submitted)).unwrap();
            for fill in &out.fills {
                let idx = CODES.iter().position(|c| *c == fill.code).unwrap();
                let bar = store.history(&fill.code).unwrap().bar(date).unwrap();
                match fill.side {
                    OrderSide::Buy => {
                        let bid = submitted[idx].buy_price;
                        prop_assert!(fill.clearing_price >= bar.low);
                        prop_assert!(fill.clearing_price <= bid.min(bar.high));
                    }
                    OrderSide::Sell => {
                        let bid = submitted[idx].sell_price;
                        prop_assert!(fill.clearing_price <= bar.high);
                        prop_assert!(fill.clearing_price >= bid.max(bar.low));
                    }
                }
            }
        }
    }
}

// ── 4. Rebase neutrality ─────────────────────────────────────────────

/// Single flat session at `price` so a buy fills exactly at the bid.
fn flat_store(price: f64) -> HistoryStore {
    let mut bars = HashMap::new();
    bars.insert(
        CODES[0].to_string(),
        vec![DailyBar {
            date: d(0),
            open: price,
            high: price * 1.01,
            low: price * 0.99,
            close: price,
            pre_close: price,
            pct_change: 0.0,
            adj_factor: 1.0,
        }],
    );
    HistoryStore::from_bars(bars)
}

proptest! {
    /// Rebasing scales shares by the ratio (to the nearest whole share) and
    /// changes neither the cost basis nor cumulative P&L/costs.
    #[test]
    fn rebase_scales_shares_and_nothing_else(
        shares in 1u64..1_000_000,
        ratio in prop_oneof![Just(1.0), 1.05..4.0_f64, 0.25..0.95_f64],
    ) {
        let price = 10.0;
        let store = flat_store(price);
        let engine = MatchingEngine::default();
        let market = MarketView { store: &store, engine: &engine, date: d(0) };

        // materialize exactly `shares` shares through a real buy
        let mut ledger = Ledger::new(CODES[0], CostModel::default());
        let funded = shares as f64 * price;
        let buy = ledger.buy_to_target(&market, 1.0, price, funded, funded).unwrap();
        prop_assert_eq!(buy.volume, shares);

        let before = ledger.position().clone();
        ledger.rebase(ratio);

        let expected = ((shares as f64) * ratio).round() as u64;
        prop_assert_eq!(ledger.shares(), expected);
        prop_assert_eq!(ledger.position().cost_basis, before.cost_basis);
        prop_assert_eq!(ledger.position().cumulative_pnl, before.cumulative_pnl);
        prop_assert_eq!(
            ledger.position().cumulative_transaction_cost,
            before.cumulative_transaction_cost
        );

        // a ratio of 1 is always a no-op, however often it is applied
        let after_rebase = ledger.shares();
        ledger.rebase(1.0);
        ledger.rebase(1.0);
        prop_assert_eq!(ledger.shares(), after_rebase);
    }
}
