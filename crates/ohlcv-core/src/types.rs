//! Core data types for the download pipeline.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`DateSpec`] - Explicit date range or named period
//! - [`FetchRequest`] - One unit of download work
//! - [`NormalizedRow`] - One canonical OHLCV observation
//! - [`CompanyInfo`] - Ticker reference information

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};
use crate::frequency::Period;

/// Canonical column names of a normalized table, in output order.
pub const CANONICAL_COLUMNS: [&str; 9] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "dividends",
    "stock_splits",
    "ticker",
];

/// Price columns that are rounded during normalization.
pub const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// Calendar-day format used for dates in tables and file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A trading symbol/ticker.
///
/// Symbols are trimmed and uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The time window of a request: an explicit range or a named period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSpec {
    /// Inclusive calendar range.
    Range {
        /// First day of the range.
        start: NaiveDate,
        /// Last day of the range.
        end: NaiveDate,
    },
    /// Relative period such as `1y`.
    Period(Period),
}

impl DateSpec {
    /// Creates a range spec, rejecting `start > end`.
    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataError::InvalidParameter(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self::Range { start, end })
    }

    /// The range component used in output file names.
    ///
    /// `{start}_{end}` for ranges, the period token otherwise.
    #[must_use]
    pub fn file_component(&self) -> String {
        match self {
            Self::Range { start, end } => {
                format!("{}_{}", start.format(DATE_FORMAT), end.format(DATE_FORMAT))
            }
            Self::Period(period) => period.as_str().to_string(),
        }
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { start, end } => write!(f, "{start} to {end}"),
            Self::Period(period) => write!(f, "period {period}"),
        }
    }
}

/// One unit of download work.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Ticker symbol sent to the provider and used in file names.
    pub symbol: Symbol,
    /// Free-text name carried for logging only.
    pub display_name: Option<String>,
    /// Requested time window.
    pub spec: DateSpec,
    /// Whether prices are split/dividend adjusted.
    pub auto_adjust: bool,
}

impl FetchRequest {
    /// Creates an adjusted request for a symbol.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, spec: DateSpec) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: None,
            spec,
            auto_adjust: true,
        }
    }

    /// Parses a ticker-list entry of the form `SYMBOL` or `SYMBOL, Display Name`.
    ///
    /// Only the part before the first comma becomes the symbol.
    pub fn parse_entry(entry: &str, spec: DateSpec, auto_adjust: bool) -> Result<Self> {
        let (symbol, name) = match entry.split_once(',') {
            Some((symbol, name)) => (symbol.trim(), Some(name.trim())),
            None => (entry.trim(), None),
        };

        if symbol.is_empty() {
            return Err(DataError::InvalidParameter(format!(
                "ticker entry '{entry}' has no symbol"
            )));
        }

        Ok(Self {
            symbol: Symbol::new(symbol),
            display_name: name.filter(|n| !n.is_empty()).map(str::to_string),
            spec,
            auto_adjust,
        })
    }

    /// Sets the adjustment flag.
    #[must_use]
    pub const fn with_auto_adjust(mut self, auto_adjust: bool) -> Self {
        self.auto_adjust = auto_adjust;
        self
    }

    /// `adj` or `raw`, as used in file names.
    #[must_use]
    pub const fn adjustment_suffix(&self) -> &'static str {
        if self.auto_adjust { "adj" } else { "raw" }
    }

    /// Deterministic output file name for this request.
    ///
    /// `{ticker}_{period}_{adj|raw}.{ext}` or
    /// `{ticker}_{start}_{end}_{adj|raw}.{ext}`.
    #[must_use]
    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            self.symbol,
            self.spec.file_component(),
            self.adjustment_suffix(),
            extension
        )
    }

    /// Label for log lines: the symbol, followed by the display name if any.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{} ({name})", self.symbol),
            None => self.symbol.to_string(),
        }
    }
}

/// One canonical OHLCV observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: u64,
    /// Cash dividend paid on this day.
    pub dividends: f64,
    /// Split ratio effective on this day (0 when none).
    pub stock_splits: f64,
    /// Ticker symbol.
    pub ticker: String,
}

impl NormalizedRow {
    /// Returns true when `low` and `high` bound the other prices.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.high).min(self.close)
            && self.high >= self.open.max(self.low).max(self.close)
    }

    /// Extracts rows from a normalized table.
    ///
    /// Rows with a null date, price or ticker are skipped.
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let tickers = df.column("ticker")?.str()?.clone();
        let open = f64_column(df, "open")?;
        let high = f64_column(df, "high")?;
        let low = f64_column(df, "low")?;
        let close = f64_column(df, "close")?;
        let dividends = f64_column(df, "dividends")?;
        let splits = f64_column(df, "stock_splits")?;
        let volume = df.column("volume")?.cast(&DataType::UInt64)?;
        let volume = volume.u64()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(date), Some(ticker), Some(open), Some(high), Some(low), Some(close)) = (
                dates.get(i),
                tickers.get(i),
                open.get(i),
                high.get(i),
                low.get(i),
                close.get(i),
            ) else {
                continue;
            };

            rows.push(Self {
                date: date.to_string(),
                open,
                high,
                low,
                close,
                volume: volume.get(i).unwrap_or(0),
                dividends: dividends.get(i).unwrap_or(0.0),
                stock_splits: splits.get(i).unwrap_or(0.0),
                ticker: ticker.to_string(),
            });
        }

        Ok(rows)
    }
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.clone())
}

/// Ticker reference information.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    /// Stock symbol.
    pub symbol: Symbol,
    /// Company name.
    pub name: String,
    /// Primary exchange.
    pub exchange: String,
    /// Business sector.
    pub sector: String,
    /// Industry within the sector.
    pub industry: String,
    /// Country of incorporation.
    pub country: String,
    /// Trading currency.
    pub currency: String,
    /// Market capitalization in `currency`.
    pub market_cap: Option<f64>,
    /// Business description.
    pub description: Option<String>,
}

impl CompanyInfo {
    /// Creates new company info with the symbol and name set.
    #[must_use]
    pub fn new(symbol: Symbol, name: impl Into<String>) -> Self {
        Self {
            symbol,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the market capitalization.
    #[must_use]
    pub const fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    /// Sets the business description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
