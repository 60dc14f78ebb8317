//! Per-instrument CSV cache for daily bars.
//!
//! One CSV file per instrument under the cache directory, serialized straight
//! from `DailyBar` so cached files are diffable and editable by hand.

use super::provider::DataError;
use crate::domain::DailyBar;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CsvCache {
    dir: PathBuf,
}

/// Summary of one cached instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub code: String,
    pub rows: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

impl CsvCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.csv"))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.path_for(code).exists()
    }

    pub fn load(&self, code: &str) -> Result<Vec<DailyBar>, DataError> {
        let path = self.path_for(code);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                code: code.to_string(),
            });
        }
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::CacheError(format!("{}: {e}", path.display())))?;
        let mut bars = Vec::new();
        for row in reader.deserialize() {
            let bar: DailyBar =
                row.map_err(|e| DataError::CacheError(format!("{}: {e}", path.display())))?;
            bars.push(bar);
        }
        Ok(bars)
    }

    pub fn write(&self, code: &str, bars: &[DailyBar]) -> Result<(), DataError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| DataError::CacheError(format!("{}: {e}", self.dir.display())))?;
        let path = self.path_for(code);
        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| DataError::CacheError(format!("{}: {e}", path.display())))?;
        for bar in bars {
            writer
                .serialize(bar)
                .map_err(|e| DataError::CacheError(format!("{}: {e}", path.display())))?;
        }
        writer
            .flush()
            .map_err(|e| DataError::CacheError(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    /// One entry per cached instrument, sorted by code.
    pub fn status(&self) -> Result<Vec<CacheEntry>, DataError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        let listing = fs::read_dir(&self.dir)
            .map_err(|e| DataError::CacheError(format!("{}: {e}", self.dir.display())))?;
        for item in listing {
            let item = item.map_err(|e| DataError::CacheError(e.to_string()))?;
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(code) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bars = self.load(code)?;
            entries.push(CacheEntry {
                code: code.to_string(),
                rows: bars.len(),
                first: bars.first().map(|b| b.date),
                last: bars.last().map(|b| b.date),
            });
        }
        entries.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(entries)
    }
}
