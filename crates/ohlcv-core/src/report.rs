//! Per-ticker outcomes and the aggregate download report.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{error::DataError, types::Symbol};

/// Why a ticker ended up in the failed list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Every fetch attempt failed.
    Fetch,
    /// The provider had no rows for the request.
    NoData,
    /// The data was fetched but could not be written.
    Persist,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch failed",
            Self::NoData => "no data",
            Self::Persist => "write failed",
        })
    }
}

/// Terminal state of one request.
#[derive(Debug)]
pub enum OutcomeStatus {
    /// Normalized table ready to be persisted.
    Success(DataFrame),
    /// The request failed; carries the last error seen.
    Failure(FailureReason, DataError),
}

/// Result of one request after all retries.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Ticker the outcome belongs to.
    pub symbol: Symbol,
    /// Success or failure.
    pub status: OutcomeStatus,
    /// Number of fetch attempts made, including the first.
    pub attempts: u32,
}

impl FetchOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub const fn success(symbol: Symbol, table: DataFrame, attempts: u32) -> Self {
        Self {
            symbol,
            status: OutcomeStatus::Success(table),
            attempts,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub const fn failure(
        symbol: Symbol,
        reason: FailureReason,
        error: DataError,
        attempts: u32,
    ) -> Self {
        Self {
            symbol,
            status: OutcomeStatus::Failure(reason, error),
            attempts,
        }
    }
}

/// A failed ticker with the reason and final error message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// The ticker.
    pub ticker: Symbol,
    /// Failure class.
    pub reason: FailureReason,
    /// Display form of the last error.
    pub error: String,
}

/// Aggregate result of a download run.
///
/// Ticker lists are in completion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Number of requests submitted.
    pub total: usize,
    /// Number of requests that were fetched and written.
    pub successful: usize,
    /// Number of requests that failed for any reason.
    pub failed: usize,
    /// Successful tickers, in completion order.
    pub successful_tickers: Vec<Symbol>,
    /// Failed tickers, in completion order.
    pub failed_tickers: Vec<Symbol>,
    /// Reason and message for each failed ticker.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureDetail>,
}

impl DownloadReport {
    /// Creates an empty report expecting `total` outcomes.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Records one finished outcome.
    pub fn record(&mut self, outcome: &FetchOutcome) {
        match &outcome.status {
            OutcomeStatus::Success(_) => {
                self.successful += 1;
                self.successful_tickers.push(outcome.symbol.clone());
            }
            OutcomeStatus::Failure(reason, error) => {
                self.failed += 1;
                self.failed_tickers.push(outcome.symbol.clone());
                self.failures.push(FailureDetail {
                    ticker: outcome.symbol.clone(),
                    reason: *reason,
                    error: error.to_string(),
                });
            }
        }
    }

    /// Returns true once every submitted request has been recorded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.successful + self.failed == self.total
    }

    /// Returns true when no request failed.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_counts_consistent() {
        let mut report = DownloadReport::new(3);
        report.record(&FetchOutcome::success(
            Symbol::new("AAPL"),
            DataFrame::empty(),
            1,
        ));
        report.record(&FetchOutcome::failure(
            Symbol::new("ZZZZ"),
            FailureReason::NoData,
            DataError::DataNotAvailable {
                symbol: "ZZZZ".into(),
                range: "1y".into(),
            },
            1,
        ));
        assert!(!report.is_complete());
        report.record(&FetchOutcome::failure(
            Symbol::new("MSFT"),
            FailureReason::Persist,
            DataError::Io("read-only".into()),
            2,
        ));

        assert!(report.is_complete());
        assert!(!report.all_succeeded());
        assert_eq!(report.successful_tickers, vec![Symbol::new("AAPL")]);
        assert_eq!(
            report.failed_tickers,
            vec![Symbol::new("ZZZZ"), Symbol::new("MSFT")]
        );
        assert_eq!(report.failures[1].reason, FailureReason::Persist);
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = DownloadReport::new(1);
        report.record(&FetchOutcome::success(
            Symbol::new("SPY"),
            DataFrame::empty(),
            1,
        ));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total": 1,
                "successful": 1,
                "failed": 0,
                "successful_tickers": ["SPY"],
                "failed_tickers": [],
            })
        );
    }
}
