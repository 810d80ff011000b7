#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcv/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Parallel OHLCV downloader.
//!
//! This crate provides the [`ParallelFetchEngine`] and re-exports the core
//! types, the writers from `ohlcv-store` and, behind features, the provider
//! and post-processing crates.
//!
//! # Features
//!
//! - `yahoo` - Yahoo Finance client
//! - `process` - Validation, indicators, returns and resampling
//!
//! # Example
//!
//! ```rust,ignore
//! use ohlcv::{DateSpec, EngineConfig, FetchRequest, FileWriter, OutputFormat, ParallelFetchEngine, Period, YahooClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ohlcv::Result<()> {
//!     let engine = ParallelFetchEngine::new(
//!         Arc::new(YahooClient::new()),
//!         EngineConfig::default().with_max_concurrent(20),
//!     )?;
//!
//!     let spec = DateSpec::Period(Period::OneYear);
//!     let requests = vec![FetchRequest::new("AAPL", spec), FetchRequest::new("MSFT", spec)];
//!     let writer = Arc::new(FileWriter::new(OutputFormat::Parquet));
//!
//!     let report = engine.fetch_all(&requests, writer, "data/downloads".as_ref()).await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use ohlcv_core::*;

// Writers and input sources
pub use ohlcv_store::{
    FileWriter, MemoryWriter, available_countries, country_tickers, load_tickers_from_file,
    parse_ticker_list, read_table, write_table,
};

// Providers
#[cfg(feature = "yahoo")]
pub use ohlcv_yahoo::YahooClient;

// Post-processing
#[cfg(feature = "process")]
pub use ohlcv_process as process;

mod config;
mod engine;
mod gate;
mod normalize;

pub use config::{
    DEFAULT_MAX_CONCURRENT, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY, DEFAULT_TIMEOUT,
    EngineConfig,
};
pub use engine::ParallelFetchEngine;
pub use gate::AdmissionGate;
pub use normalize::{PRICE_DECIMALS, normalize, output_path};
