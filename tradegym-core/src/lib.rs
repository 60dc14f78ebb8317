//! tradegym core — matching engine, corporate-action adjuster, position
//! ledger, and portfolio aggregation for a restricted-liquidity daily-bar
//! exchange.
//!
//! Given historical daily bars, this crate decides whether a hypothetical
//! order would have filled, at what price, and folds fills into a
//! cash/position ledger day over day across a multi-asset account:
//! - Domain types (bars, fills, snapshots)
//! - Instrument history store with the union open-trading-day calendar
//! - Price-limit matching (suspensions, locked limit-up/limit-down sessions)
//! - Split/dividend rebasing via adjustment-factor ratios
//! - Per-instrument ledgers over one shared cash pool, sells before buys
//! - Data providers and the CSV bar cache
//!
//! Everything is single-threaded and synchronous: one simulated day completes
//! fully (rebase → sells → buys → mark-to-market → aggregate) before the next
//! begins, and no history lookup touches I/O.

pub mod data;
pub mod domain;
pub mod ledger;
pub mod market;
pub mod portfolio;
