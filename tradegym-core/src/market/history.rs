//! Instrument history store and the open-trading-day calendar.
//!
//! Bars live in memory for the lifetime of an episode and are read-only to
//! every other component. A date absent from an instrument's table means the
//! instrument did not trade that day — no distinction is made between "not
//! listed yet" and "suspended".

use crate::domain::DailyBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors from history lookups that cannot be answered at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarketError {
    #[error("no history for '{code}' at or before {date}")]
    MissingHistory { code: String, date: NaiveDate },
}

/// Ordered per-instrument bar table with date-indexed lookups.
#[derive(Debug, Clone, Default)]
pub struct InstrumentHistory {
    /// Sorted ascending by date, dates unique.
    bars: Vec<DailyBar>,
}

impl InstrumentHistory {
    pub fn new(mut bars: Vec<DailyBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self { bars }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Exact-date lookup.
    pub fn bar(&self, date: NaiveDate) -> Option<&DailyBar> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Most recent bar strictly before `date`.
    pub fn bar_before(&self, date: NaiveDate) -> Option<&DailyBar> {
        let i = self.bars.partition_point(|b| b.date < date);
        if i == 0 {
            None
        } else {
            Some(&self.bars[i - 1])
        }
    }

    /// Bar at `date`, or carried forward from the most recent earlier session.
    pub fn bar_at_or_before(&self, date: NaiveDate) -> Option<&DailyBar> {
        let i = self.bars.partition_point(|b| b.date <= date);
        if i == 0 {
            None
        } else {
            Some(&self.bars[i - 1])
        }
    }
}

/// Read-only market history for a set of instruments, plus the union
/// open-trading-day calendar.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    instruments: HashMap<String, InstrumentHistory>,
    /// Instrument codes, sorted for deterministic iteration.
    codes: Vec<String>,
    /// Union of all instruments' trading dates, ascending.
    open_dates: Vec<NaiveDate>,
}

impl HistoryStore {
    pub fn from_bars(bars_by_code: HashMap<String, Vec<DailyBar>>) -> Self {
        let mut all_dates = BTreeSet::new();
        for bars in bars_by_code.values() {
            for bar in bars {
                all_dates.insert(bar.date);
            }
        }

        let mut codes: Vec<String> = bars_by_code.keys().cloned().collect();
        codes.sort();

        let instruments = bars_by_code
            .into_iter()
            .map(|(code, bars)| (code, InstrumentHistory::new(bars)))
            .collect();

        Self {
            instruments,
            codes,
            open_dates: all_dates.into_iter().collect(),
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn history(&self, code: &str) -> Option<&InstrumentHistory> {
        self.instruments.get(code)
    }

    pub fn open_dates(&self) -> &[NaiveDate] {
        &self.open_dates
    }

    pub fn last_open_date(&self) -> Option<NaiveDate> {
        self.open_dates.last().copied()
    }

    /// Index of `date` in the open-date calendar.
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.open_dates.binary_search(&date).ok()
    }

    /// Whether the instrument has no bar for `date` (halted, or unknown code).
    pub fn is_suspended(&self, code: &str, date: NaiveDate) -> bool {
        self.history(code).and_then(|h| h.bar(date)).is_none()
    }

    /// The day's close, carried forward across suspensions.
    pub fn close_on(&self, code: &str, date: NaiveDate) -> Result<f64, MarketError> {
        self.history(code)
            .and_then(|h| h.bar_at_or_before(date))
            .map(|b| b.close)
            .ok_or_else(|| MarketError::MissingHistory {
                code: code.to_string(),
                date,
            })
    }

    /// The previous-close reference price for `date`. When the instrument is
    /// suspended the most recent earlier session's record is used.
    pub fn pre_close_on(&self, code: &str, date: NaiveDate) -> Result<f64, MarketError> {
        let history = self
            .history(code)
            .ok_or_else(|| MarketError::MissingHistory {
                code: code.to_string(),
                date,
            })?;
        if let Some(bar) = history.bar(date) {
            return Ok(bar.pre_close);
        }
        history
            .bar_before(date)
            .map(|b| b.pre_close)
            .ok_or_else(|| MarketError::MissingHistory {
                code: code.to_string(),
                date,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bar(date: &str, close: f64) -> DailyBar {
        DailyBar {
            date: d(date),
            open: close - 0.2,
            high: close + 0.3,
            low: close - 0.4,
            close,
            pre_close: close - 0.1,
            pct_change: 0.6,
            adj_factor: 1.0,
        }
    }

    fn store() -> HistoryStore {
        let mut bars = HashMap::new();
        bars.insert(
            "000001.SZ".to_string(),
            vec![bar("2019-10-21", 16.6), bar("2019-10-22", 16.8), bar("2019-10-24", 17.0)],
        );
        bars.insert(
            "600000.SH".to_string(),
            vec![bar("2019-10-22", 12.1), bar("2019-10-23", 12.3)],
        );
        HistoryStore::from_bars(bars)
    }

    #[test]
    fn calendar_is_union_of_dates() {
        let store = store();
        let dates: Vec<_> = store.open_dates().to_vec();
        assert_eq!(
            dates,
            vec![d("2019-10-21"), d("2019-10-22"), d("2019-10-23"), d("2019-10-24")]
        );
        assert_eq!(store.date_index(d("2019-10-23")), Some(2));
        assert_eq!(store.date_index(d("2019-10-20")), None);
    }

    #[test]
    fn codes_are_sorted() {
        assert_eq!(store().codes(), &["000001.SZ", "600000.SH"]);
    }

    #[test]
    fn suspension_detection() {
        let store = store();
        assert!(!store.is_suspended("000001.SZ", d("2019-10-21")));
        // no bar on the 23rd for 000001.SZ
        assert!(store.is_suspended("000001.SZ", d("2019-10-23")));
        assert!(store.is_suspended("999999.SZ", d("2019-10-21")));
    }

    #[test]
    fn close_carries_forward_across_suspension() {
        let store = store();
        assert_eq!(store.close_on("000001.SZ", d("2019-10-23")).unwrap(), 16.8);
        assert_eq!(store.close_on("000001.SZ", d("2019-10-24")).unwrap(), 17.0);
        assert_eq!(
            store.close_on("000001.SZ", d("2019-10-20")),
            Err(MarketError::MissingHistory {
                code: "000001.SZ".into(),
                date: d("2019-10-20"),
            })
        );
    }

    #[test]
    fn pre_close_uses_latest_record_when_suspended() {
        let store = store();
        // trading day: that bar's own pre_close
        assert!((store.pre_close_on("000001.SZ", d("2019-10-22")).unwrap() - 16.7).abs() < 1e-9);
        // suspended day: previous session's record
        assert!((store.pre_close_on("000001.SZ", d("2019-10-23")).unwrap() - 16.7).abs() < 1e-9);
    }

    #[test]
    fn strictly_before_lookup() {
        let store = store();
        let h = store.history("000001.SZ").unwrap();
        assert_eq!(h.bar_before(d("2019-10-22")).unwrap().date, d("2019-10-21"));
        assert!(h.bar_before(d("2019-10-21")).is_none());
    }
}
