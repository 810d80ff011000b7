#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcv/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance data provider.
//!
//! This crate provides a Yahoo Finance client that implements the
//! [`DataProvider`], [`FetchClient`], and [`ReferenceClient`] traits from
//! `ohlcv-core`.
//!
//! # Features
//!
//! - Daily history from Yahoo Finance's chart API, by date range or named period
//! - Dividend and split events joined onto the bars
//! - Split/dividend price adjustment from the adjusted close
//! - Per-request timeout taken from the query
//! - Optional minimum spacing between requests
//! - Company info lookup
//!
//! # Example
//!
//! ```no_run
//! use ohlcv_yahoo::YahooClient;
//! use ohlcv_core::{DateSpec, FetchClient, FetchQuery, Period, Symbol};
//! use std::time::Duration;
//!
//! # async fn example() -> ohlcv_core::Result<()> {
//! let client = YahooClient::new();
//! let query = FetchQuery {
//!     symbol: Symbol::new("AAPL"),
//!     spec: DateSpec::Period(Period::OneYear),
//!     auto_adjust: true,
//!     timeout: Duration::from_secs(30),
//! };
//!
//! let df = client.fetch(&query).await?;
//! println!("Fetched {} rows", df.height());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ohlcv_core::{
    CompanyInfo, DataError, DataProvider, DateSpec, FetchClient, FetchQuery, ReferenceClient,
    Result, Symbol,
};
use polars::prelude::*;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

/// Yahoo Finance chart API base URL.
const CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quote summary API base URL.
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Provider name used in errors and logs.
const PROVIDER_NAME: &str = "Yahoo Finance";

/// Default timeout for requests that carry no timeout of their own.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Column labels of the raw table, in output order.
pub const RAW_COLUMNS: [&str; 8] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Dividends",
    "Stock Splits",
];

/// Yahoo Finance client.
///
/// Implements [`DataProvider`], [`FetchClient`], and [`ReferenceClient`].
#[derive(Debug)]
pub struct YahooClient {
    client: reqwest::Client,
    rate_limit_ms: u64,
    last_request_time: AtomicU64,
}

impl YahooClient {
    /// Create a new Yahoo Finance client with default settings.
    ///
    /// No spacing is enforced between requests; the download engine bounds
    /// concurrency itself.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::ZERO)
    }

    /// Create a new Yahoo Finance client with a custom HTTP client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            rate_limit_ms: 0,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Create a new Yahoo Finance client that spaces requests by at least `rate_limit`.
    #[must_use]
    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            rate_limit_ms: rate_limit.as_millis() as u64,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Apply rate limiting before making a request.
    async fn apply_rate_limit(&self) {
        if self.rate_limit_ms == 0 {
            return;
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let last = self.last_request_time.swap(now, Ordering::Relaxed);
        let elapsed = now.saturating_sub(last);

        if elapsed < self.rate_limit_ms {
            let wait_time = self.rate_limit_ms - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time);
            sleep(Duration::from_millis(wait_time)).await;
        }
    }

    /// Build the chart API URL for a symbol and date spec.
    fn build_chart_url(&self, symbol: &Symbol, spec: &DateSpec) -> String {
        let window = match spec {
            DateSpec::Range { start, end } => {
                let start_ts = start
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
                    .unwrap_or(0);

                let end_ts = end
                    .and_hms_opt(23, 59, 59)
                    .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
                    .unwrap_or(0);

                format!("period1={start_ts}&period2={end_ts}")
            }
            DateSpec::Period(period) => format!("range={period}"),
        };

        format!(
            "{}/{}?{}&interval=1d&events=div%2Csplits&includeAdjustedClose=true",
            CHART_API_URL,
            symbol.as_str(),
            window
        )
    }

    /// Send a GET request and map HTTP failures to [`DataError`]s.
    async fn get(&self, url: &str, symbol: &Symbol, timeout: Duration) -> Result<reqwest::Response> {
        self.apply_rate_limit().await;
        debug!("Requesting {}", url);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DataError::Timeout(timeout)
                } else {
                    DataError::Network(e.to_string())
                }
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }

        if !response.status().is_success() {
            return Err(DataError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }

        Ok(response)
    }

    /// Parse a chart response into a provider-labelled DataFrame.
    fn parse_chart_response(&self, query: &FetchQuery, response: ChartResponse) -> Result<DataFrame> {
        let symbol = &query.symbol;

        if let Some(error) = response.chart.error {
            if error.code == "Not Found" {
                return Err(DataError::SymbolNotFound(symbol.to_string()));
            }
            return Err(DataError::Other(format!(
                "{}: {}",
                error.code, error.description
            )));
        }

        let result = response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

        let timestamps = result.timestamp.unwrap_or_default();
        if timestamps.is_empty() {
            return Err(DataError::DataNotAvailable {
                symbol: symbol.to_string(),
                range: query.spec.file_component(),
            });
        }

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::Parse("Missing quote data".to_string()))?;

        let adj_close = result
            .indicators
            .adjclose
            .and_then(|ac| ac.into_iter().next())
            .map(|ac| ac.adjclose)
            .unwrap_or_default();

        // Exchange-local dates: Yahoo stamps bars at the session open in UTC.
        let gmt_offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
        let events = result.events.unwrap_or_default();
        let dividends = events.dividend_amounts(gmt_offset);
        let splits = events.split_ratios(gmt_offset);

        let mut dates = Vec::with_capacity(timestamps.len());
        let mut opens = Vec::with_capacity(timestamps.len());
        let mut highs = Vec::with_capacity(timestamps.len());
        let mut lows = Vec::with_capacity(timestamps.len());
        let mut closes = Vec::with_capacity(timestamps.len());
        let mut volumes = Vec::with_capacity(timestamps.len());
        let mut dividend_col = Vec::with_capacity(timestamps.len());
        let mut split_col = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            // Yahoo emits a trailing all-null bar for sessions in progress
            let Some(close) = value_at(&quote.close, i) else {
                continue;
            };
            let date = local_date(ts, gmt_offset)?;

            let factor = if query.auto_adjust {
                value_at(&adj_close, i)
                    .filter(|_| close != 0.0)
                    .map_or(1.0, |adj| adj / close)
            } else {
                1.0
            };

            dates.push(days_since_epoch(date));
            opens.push(value_at(&quote.open, i).map(|v| v * factor));
            highs.push(value_at(&quote.high, i).map(|v| v * factor));
            lows.push(value_at(&quote.low, i).map(|v| v * factor));
            closes.push(Some(close * factor));
            volumes.push(quote.volume.get(i).copied().flatten());
            dividend_col.push(dividends.get(&date).copied().unwrap_or(0.0));
            split_col.push(splits.get(&date).copied().unwrap_or(0.0));
        }

        let date_col = Column::new(RAW_COLUMNS[0].into(), dates).cast(&DataType::Date)?;

        let df = DataFrame::new(vec![
            date_col,
            Column::new(RAW_COLUMNS[1].into(), opens),
            Column::new(RAW_COLUMNS[2].into(), highs),
            Column::new(RAW_COLUMNS[3].into(), lows),
            Column::new(RAW_COLUMNS[4].into(), closes),
            Column::new(RAW_COLUMNS[5].into(), volumes),
            Column::new(RAW_COLUMNS[6].into(), dividend_col),
            Column::new(RAW_COLUMNS[7].into(), split_col),
        ])?;

        Ok(df)
    }

    /// Fetch quote summary data for a symbol.
    async fn fetch_quote_summary(&self, symbol: &Symbol) -> Result<QuoteSummaryResponse> {
        let url = format!(
            "{}/{}?modules=assetProfile,price",
            QUOTE_SUMMARY_URL,
            symbol.as_str()
        );

        self.get(&url, symbol, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .await?
            .json::<QuoteSummaryResponse>()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for YahooClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Yahoo Finance daily OHLCV history and company information"
    }
}

#[async_trait]
impl FetchClient for YahooClient {
    async fn fetch(&self, query: &FetchQuery) -> Result<DataFrame> {
        let url = self.build_chart_url(&query.symbol, &query.spec);

        let chart_response: ChartResponse = self
            .get(&url, &query.symbol, query.timeout)
            .await?
            .json()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))?;

        self.parse_chart_response(query, chart_response)
    }
}

#[async_trait]
impl ReferenceClient for YahooClient {
    async fn company_info(&self, symbol: &Symbol) -> Result<CompanyInfo> {
        let summary = self.fetch_quote_summary(symbol).await?;

        let result = summary
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

        let profile = result.asset_profile.unwrap_or_default();
        let price = result.price.unwrap_or_default();

        let mut info = CompanyInfo::new(
            symbol.clone(),
            price
                .long_name
                .or(price.short_name)
                .unwrap_or_else(|| "N/A".to_string()),
        );
        info.exchange = price.exchange_name.unwrap_or_else(|| "N/A".to_string());
        info.currency = price.currency.unwrap_or_else(|| "N/A".to_string());
        info.sector = profile.sector.unwrap_or_else(|| "N/A".to_string());
        info.industry = profile.industry.unwrap_or_else(|| "N/A".to_string());
        info.country = profile.country.unwrap_or_else(|| "N/A".to_string());

        if let Some(cap) = price.market_cap.and_then(|c| c.raw) {
            info = info.with_market_cap(cap);
        }
        if let Some(summary) = profile.long_business_summary {
            info = info.with_description(summary);
        }

        Ok(info)
    }
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

fn local_date(ts: i64, gmt_offset: i64) -> Result<NaiveDate> {
    Utc.timestamp_opt(ts + gmt_offset, 0)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataError::Parse(format!("invalid timestamp {ts}")))
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - DateTime::UNIX_EPOCH.date_naive()).num_days() as i32
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

/// Chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    events: Option<ChartEvents>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

impl ChartEvents {
    fn dividend_amounts(&self, gmt_offset: i64) -> HashMap<NaiveDate, f64> {
        self.dividends
            .values()
            .filter_map(|d| Some((local_date(d.date, gmt_offset).ok()?, d.amount)))
            .collect()
    }

    fn split_ratios(&self, gmt_offset: i64) -> HashMap<NaiveDate, f64> {
        self.splits
            .values()
            .filter(|s| s.denominator != 0.0)
            .filter_map(|s| {
                Some((
                    local_date(s.date, gmt_offset).ok()?,
                    s.numerator / s.denominator,
                ))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    numerator: f64,
    denominator: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

/// Quote Summary API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryData {
    asset_profile: Option<AssetProfile>,
    price: Option<PriceModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
    country: Option<String>,
    long_business_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    exchange_name: Option<String>,
    currency: Option<String>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohlcv_core::Period;

    fn query(spec: DateSpec, auto_adjust: bool) -> FetchQuery {
        FetchQuery {
            symbol: Symbol::new("AAPL"),
            spec,
            auto_adjust,
            timeout: Duration::from_secs(5),
        }
    }

    // Two sessions (2024-01-02, 2024-01-03 at 14:30 UTC) plus a trailing
    // null bar, with a dividend on the second day.
    const CHART_FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "gmtoffset": -18000 },
                "timestamp": [1704205800, 1704292200, 1704378600],
                "events": {
                    "dividends": { "1704292200": { "amount": 0.24, "date": 1704292200 } }
                },
                "indicators": {
                    "quote": [{
                        "open": [100.0, 102.0, null],
                        "high": [105.0, 106.0, null],
                        "low": [99.0, 101.0, null],
                        "close": [104.0, 105.0, null],
                        "volume": [1000, 2000, null]
                    }],
                    "adjclose": [{ "adjclose": [52.0, 52.5, null] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_build_chart_url_for_range() {
        let client = YahooClient::new();
        let spec = DateSpec::Range {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };

        let url = client.build_chart_url(&Symbol::new("AAPL"), &spec);

        assert!(url.contains("/AAPL?"));
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("interval=1d"));
        assert!(url.contains("includeAdjustedClose=true"));
    }

    #[test]
    fn test_build_chart_url_for_period() {
        let client = YahooClient::new();
        let url = client.build_chart_url(&Symbol::new("MSFT"), &DateSpec::Period(Period::FiveYears));

        assert!(url.contains("range=5y"));
        assert!(!url.contains("period1"));
    }

    #[test]
    fn test_parse_chart_response_raw() {
        let client = YahooClient::new();
        let response: ChartResponse = serde_json::from_str(CHART_FIXTURE).unwrap();
        let df = client
            .parse_chart_response(&query(DateSpec::Period(Period::OneMonth), false), response)
            .unwrap();

        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, RAW_COLUMNS.to_vec());
        let close = df.column("Close").unwrap().f64().unwrap();
        assert_eq!(close.get(1), Some(105.0));
        let dividends = df.column("Dividends").unwrap().f64().unwrap();
        assert_eq!(dividends.get(0), Some(0.0));
        assert_eq!(dividends.get(1), Some(0.24));
    }

    #[test]
    fn test_parse_chart_response_adjusted() {
        let client = YahooClient::new();
        let response: ChartResponse = serde_json::from_str(CHART_FIXTURE).unwrap();
        let df = client
            .parse_chart_response(&query(DateSpec::Period(Period::OneMonth), true), response)
            .unwrap();

        let open = df.column("Open").unwrap().f64().unwrap();
        let close = df.column("Close").unwrap().f64().unwrap();
        assert_eq!(open.get(0), Some(50.0));
        assert_eq!(close.get(0), Some(52.0));
    }

    #[test]
    fn test_parse_empty_history_is_data_not_available() {
        let client = YahooClient::new();
        let response: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{"timestamp":null,"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .unwrap();

        let err = client
            .parse_chart_response(&query(DateSpec::Period(Period::OneYear), true), response)
            .unwrap_err();
        assert!(matches!(err, DataError::DataNotAvailable { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_api_not_found() {
        let client = YahooClient::new();
        let response: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .unwrap();

        let err = client
            .parse_chart_response(&query(DateSpec::Period(Period::OneYear), true), response)
            .unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound(_)));
    }

    #[test]
    fn test_provider_info() {
        let client = YahooClient::default();
        assert_eq!(client.name(), "Yahoo Finance");
    }
}
