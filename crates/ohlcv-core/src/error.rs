//! Error types for fetch, normalization and persistence.
//!
//! This module defines [`DataError`] which covers every failure the download
//! pipeline can produce, from a bad engine configuration to a single ticker's
//! network timeout. [`DataError::is_retryable`] tells the engine which of them
//! are worth another attempt.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while downloading and persisting market data.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network-related errors (connection failures, bad HTTP status, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// A single provider call exceeded its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider answered, but has no rows for the symbol and range.
    #[error("No data available for {symbol} ({range})")]
    DataNotAvailable {
        /// The symbol that was requested.
        symbol: String,
        /// Requested date range or period, as displayed in file names.
        range: String,
    },

    /// Error parsing data from a provider or from disk.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Filesystem failure while reading or writing tables.
    #[error("I/O error: {0}")]
    Io(String),

    /// The engine was constructed with an unusable parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An invalid parameter was provided to an operation.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Returns true when another attempt at the same request may succeed.
    ///
    /// A valid-but-empty answer is the only fetch failure that is final:
    /// missing data does not appear by asking again. Every other fetch
    /// failure is retried alike, including a [`DataError::Parse`] raised while
    /// normalizing a malformed provider table, even though a table missing a
    /// column is unlikely to change between attempts. Configuration,
    /// parameter and persistence errors are not fetch failures at all and are
    /// never retried either.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout(_)
                | Self::RateLimited { .. }
                | Self::SymbolNotFound(_)
                | Self::Parse(_)
                | Self::Other(_)
        )
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<polars::error::PolarsError> for DataError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
