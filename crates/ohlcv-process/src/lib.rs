#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcv/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Post-processing transforms for normalized OHLCV tables.

/// Date filtering, merging and shared column helpers.
pub mod frame;
/// Technical indicators.
pub mod indicators;
/// Bar resampling.
pub mod resample;
/// Return series.
pub mod returns;
/// Summary statistics.
pub mod summary;
/// Cleaning and consistency checks.
pub mod validate;

pub use frame::{filter_by_date_range, merge_frames};
pub use indicators::add_indicators;
pub use resample::resample;
pub use returns::calculate_returns;
pub use summary::{DataSummary, DateRange, PriceStats, VolumeStats, summarize};
pub use validate::{ValidationReport, validate};
