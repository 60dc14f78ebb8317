//! Data provider trait and structured error types.
//!
//! The `BarProvider` trait abstracts over bar sources (Tushare Pro, CSV
//! import) so implementations can be swapped and mocked for tests. The cache
//! layer sits above this trait — providers don't know about the cache.

use crate::domain::DailyBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("instrument not found: {code}")]
    InstrumentNotFound { code: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("no cached data for '{code}' — run `download {code}` first")]
    NoCachedData { code: String },
}

/// Where bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Tushare,
    Cache,
    Synthetic,
}

/// Result of a successful fetch for a single instrument.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub code: String,
    pub bars: Vec<DailyBar>,
    pub source: DataSource,
}

/// Trait for daily-bar providers.
pub trait BarProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars (with adjustment factors) for an instrument over a
    /// date range, sorted ascending by date.
    fn fetch(&self, code: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// Whether the provider can currently serve requests.
    fn is_available(&self) -> bool {
        true
    }
}
