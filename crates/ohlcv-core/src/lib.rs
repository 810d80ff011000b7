#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcv/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the OHLCV downloader.
//!
//! This crate provides the foundational abstractions shared by every other
//! crate in the workspace:
//!
//! - [`FetchClient`](client::FetchClient) - Raw history provider
//! - [`ReferenceClient`](client::ReferenceClient) - Ticker metadata provider
//! - [`TableWriter`](writer::TableWriter) - Persistence of normalized tables
//! - [`FetchRequest`](types::FetchRequest) and [`DownloadReport`](report::DownloadReport)

/// Provider traits for fetching market data.
pub mod client;
/// Error types for data operations.
pub mod error;
/// Bar frequency and named period definitions.
pub mod frequency;
/// Per-ticker outcomes and the aggregate report.
pub mod report;
/// Core data types (Symbol, FetchRequest, NormalizedRow, etc.).
pub mod types;
/// Writer trait and output formats.
pub mod writer;

// Re-export commonly used items at crate root
pub use client::{DataProvider, FetchClient, FetchQuery, ReferenceClient};
pub use error::{DataError, Result};
pub use frequency::{Frequency, Period};
pub use report::{DownloadReport, FailureDetail, FailureReason, FetchOutcome, OutcomeStatus};
pub use types::{
    CANONICAL_COLUMNS, CompanyInfo, DATE_FORMAT, DateSpec, FetchRequest, NormalizedRow,
    PRICE_COLUMNS, Symbol,
};
pub use writer::{OutputFormat, TableWriter};
