//! Tushare Pro data provider.
//!
//! Fetches raw (unadjusted) daily bars plus adjustment factors from the
//! Tushare Pro JSON API and merges them by trade date. Requires an account
//! token; the API answers every endpoint on one POST URL with a columnar
//! `{fields, items}` payload.

use super::provider::{BarProvider, DataError, DataSource, FetchResult};
use crate::domain::DailyBar;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const API_URL: &str = "http://api.tushare.pro";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    msg: Option<String>,
    data: Option<ApiData>,
}

/// Columnar payload: one `fields` header plus row-major `items`.
#[derive(Debug, Deserialize)]
struct ApiData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

pub struct TushareProvider {
    client: reqwest::blocking::Client,
    token: String,
}

impl TushareProvider {
    pub fn new(token: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            token: token.into(),
        }
    }

    fn query(
        &self,
        api_name: &str,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        fields: &str,
    ) -> Result<ApiData, DataError> {
        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": {
                "ts_code": code,
                "start_date": start.format("%Y%m%d").to_string(),
                "end_date": end.format("%Y%m%d").to_string(),
            },
            "fields": fields,
        });

        let resp = self
            .client
            .post(API_URL)
            .json(&body)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let parsed: ApiResponse = resp
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(e.to_string()))?;

        if parsed.code != 0 {
            let msg = parsed.msg.unwrap_or_else(|| format!("error code {}", parsed.code));
            return Err(if msg.contains("token") {
                DataError::AuthenticationRequired(msg)
            } else {
                DataError::ProviderRejected(msg)
            });
        }
        parsed
            .data
            .ok_or_else(|| DataError::ResponseFormatChanged("ok response with no data".into()))
    }
}

impl BarProvider for TushareProvider {
    fn name(&self) -> &str {
        "tushare"
    }

    fn fetch(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let daily = self.query(
            "daily",
            code,
            start,
            end,
            "trade_date,open,high,low,close,pre_close,pct_chg",
        )?;
        let factors = self.query("adj_factor", code, start, end, "trade_date,adj_factor")?;

        let bars = merge_bars(&daily, &factors)?;
        if bars.is_empty() {
            return Err(DataError::InstrumentNotFound {
                code: code.to_string(),
            });
        }
        Ok(FetchResult {
            code: code.to_string(),
            bars,
            source: DataSource::Tushare,
        })
    }

    fn is_available(&self) -> bool {
        !self.token.is_empty()
    }
}

fn column(fields: &[String], name: &str) -> Result<usize, DataError> {
    fields
        .iter()
        .position(|f| f == name)
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("missing column '{name}'")))
}

fn cell_f64(row: &[Value], index: usize) -> Result<f64, DataError> {
    let value = row
        .get(index)
        .ok_or_else(|| DataError::ResponseFormatChanged("short row".into()))?;
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad number: {n}"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| DataError::ResponseFormatChanged(format!("bad number: '{s}'"))),
        other => Err(DataError::ResponseFormatChanged(format!(
            "expected number, got {other}"
        ))),
    }
}

fn cell_date(row: &[Value], index: usize) -> Result<NaiveDate, DataError> {
    let value = row
        .get(index)
        .ok_or_else(|| DataError::ResponseFormatChanged("short row".into()))?;
    let text = value
        .as_str()
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("expected date, got {value}")))?;
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .map_err(|_| DataError::ResponseFormatChanged(format!("bad trade date: '{text}'")))
}

/// Merge the `daily` and `adj_factor` payloads by trade date.
///
/// Rows without a matching adjustment factor are dropped; the API serves
/// newest-first, so the result is re-sorted ascending.
fn merge_bars(daily: &ApiData, factors: &ApiData) -> Result<Vec<DailyBar>, DataError> {
    let f_date = column(&factors.fields, "trade_date")?;
    let f_factor = column(&factors.fields, "adj_factor")?;
    let mut factor_by_date: HashMap<NaiveDate, f64> = HashMap::new();
    for row in &factors.items {
        factor_by_date.insert(cell_date(row, f_date)?, cell_f64(row, f_factor)?);
    }

    let d_date = column(&daily.fields, "trade_date")?;
    let d_open = column(&daily.fields, "open")?;
    let d_high = column(&daily.fields, "high")?;
    let d_low = column(&daily.fields, "low")?;
    let d_close = column(&daily.fields, "close")?;
    let d_pre_close = column(&daily.fields, "pre_close")?;
    let d_pct_chg = column(&daily.fields, "pct_chg")?;

    let mut bars = Vec::with_capacity(daily.items.len());
    for row in &daily.items {
        let date = cell_date(row, d_date)?;
        let Some(&adj_factor) = factor_by_date.get(&date) else {
            continue;
        };
        bars.push(DailyBar {
            date,
            open: cell_f64(row, d_open)?,
            high: cell_f64(row, d_high)?,
            low: cell_f64(row, d_low)?,
            close: cell_f64(row, d_close)?,
            pre_close: cell_f64(row, d_pre_close)?,
            pct_change: cell_f64(row, d_pct_chg)?,
            adj_factor,
        });
    }
    bars.sort_by_key(|b| b.date);
    Ok(bars)
}
