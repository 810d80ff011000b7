//! Provider traits for fetching market data.
//!
//! This module defines the collaborator traits the engine depends on:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`FetchClient`] - Raw daily OHLCV history for one ticker
//! - [`ReferenceClient`] - Ticker metadata

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use polars::prelude::DataFrame;

use crate::{
    error::Result,
    types::{CompanyInfo, DateSpec, FetchRequest, Symbol},
};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Yahoo Finance").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Parameters of a single provider call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchQuery {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Date range or named period.
    pub spec: DateSpec,
    /// Whether prices should be split/dividend adjusted.
    pub auto_adjust: bool,
    /// Deadline for the network call.
    pub timeout: Duration,
}

impl FetchQuery {
    /// Builds the query for a request with the given per-call timeout.
    #[must_use]
    pub fn from_request(request: &FetchRequest, timeout: Duration) -> Self {
        Self {
            symbol: request.symbol.clone(),
            spec: request.spec,
            auto_adjust: request.auto_adjust,
            timeout,
        }
    }
}

/// Provider of raw daily OHLCV history.
///
/// Implementations return the table with their own column labels; the
/// engine renames them to the canonical schema. An `Ok` table with no rows,
/// or [`DataError::DataNotAvailable`](crate::DataError::DataNotAvailable),
/// means the provider has nothing for this query and is never retried. Every
/// other error is treated as transient.
#[async_trait]
pub trait FetchClient: DataProvider {
    /// Fetches the history for one ticker.
    ///
    /// Implementations must give up after `query.timeout` and report
    /// [`DataError::Timeout`](crate::DataError::Timeout).
    async fn fetch(&self, query: &FetchQuery) -> Result<DataFrame>;
}

/// Provider of ticker reference data.
#[async_trait]
pub trait ReferenceClient: DataProvider {
    /// Fetches company information for a symbol.
    async fn company_info(&self, symbol: &Symbol) -> Result<CompanyInfo>;
}
