#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcv/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Table writers and input sources for the OHLCV downloader.
//!
//! This crate provides implementations of the [`TableWriter`] trait from `ohlcv-core`:
//!
//! - [`FileWriter`] - Atomic CSV, Parquet or JSON files on disk
//! - [`MemoryWriter`] - In-memory tables for testing
//!
//! plus [`read_table`]/[`write_table`] for the same formats and the
//! [`tickers`] module for resolving ticker lists.

/// File-backed writer and format readers.
pub mod file;
/// In-memory writer implementation.
pub mod memory;
/// Ticker-list sources.
pub mod tickers;

// Re-export the trait for convenience
pub use ohlcv_core::TableWriter;

// Re-export implementations
pub use file::{FileWriter, read_table, write_table};
pub use memory::MemoryWriter;
pub use tickers::{available_countries, country_tickers, load_tickers_from_file, parse_ticker_list};
