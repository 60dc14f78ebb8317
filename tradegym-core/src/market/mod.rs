//! Market model: history store, price-limit matching, corporate actions.

pub mod adjuster;
pub mod history;
pub mod matching;

pub use history::{HistoryStore, InstrumentHistory, MarketError};
pub use matching::{MatchOutcome, MatchingEngine, RejectReason, DEFAULT_LIMIT_PCT};
