//! Summary statistics.

use ohlcv_core::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::frame::require_columns;

/// First and last date present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest date.
    pub start: String,
    /// Latest date.
    pub end: String,
}

/// Statistics of `close`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    /// Lowest close.
    pub min_close: Option<f64>,
    /// Highest close.
    pub max_close: Option<f64>,
    /// Mean close.
    pub mean_close: Option<f64>,
    /// Median close.
    pub median_close: Option<f64>,
}

/// Statistics of `volume`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeStats {
    /// Summed volume.
    pub total_volume: u64,
    /// Mean volume.
    pub mean_volume: Option<f64>,
    /// Median volume.
    pub median_volume: Option<f64>,
}

/// Overview of a table of bars.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    /// Number of rows.
    pub total_records: usize,
    /// Number of distinct tickers.
    pub unique_tickers: usize,
    /// Date span, absent for an empty table.
    pub date_range: Option<DateRange>,
    /// Close price statistics.
    pub price_stats: PriceStats,
    /// Volume statistics.
    pub volume_stats: VolumeStats,
}

/// Computes a [`DataSummary`]; an empty table yields the default summary.
pub fn summarize(df: &DataFrame) -> Result<DataSummary> {
    if df.height() == 0 {
        return Ok(DataSummary::default());
    }
    require_columns(df, &["date", "close", "volume", "ticker"])?;

    let close = || col("close").cast(DataType::Float64);
    let volume = || col("volume").cast(DataType::Float64);
    let date = || col("date").cast(DataType::String);

    let stats = df
        .clone()
        .lazy()
        .select([
            col("ticker").n_unique().alias("unique_tickers"),
            date().min().alias("start"),
            date().max().alias("end"),
            close().min().alias("min_close"),
            close().max().alias("max_close"),
            close().mean().alias("mean_close"),
            close().median().alias("median_close"),
            col("volume").cast(DataType::UInt64).sum().alias("total_volume"),
            volume().mean().alias("mean_volume"),
            volume().median().alias("median_volume"),
        ])
        .collect()?;

    let start = string_at(&stats, "start")?;
    let end = string_at(&stats, "end")?;

    Ok(DataSummary {
        total_records: df.height(),
        unique_tickers: u64_at(&stats, "unique_tickers")?.unwrap_or(0) as usize,
        date_range: start.zip(end).map(|(start, end)| DateRange { start, end }),
        price_stats: PriceStats {
            min_close: f64_at(&stats, "min_close")?,
            max_close: f64_at(&stats, "max_close")?,
            mean_close: f64_at(&stats, "mean_close")?,
            median_close: f64_at(&stats, "median_close")?,
        },
        volume_stats: VolumeStats {
            total_volume: u64_at(&stats, "total_volume")?.unwrap_or(0),
            mean_volume: f64_at(&stats, "mean_volume")?,
            median_volume: f64_at(&stats, "median_volume")?,
        },
    })
}

fn f64_at(df: &DataFrame, name: &str) -> Result<Option<f64>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.get(0))
}

fn u64_at(df: &DataFrame, name: &str) -> Result<Option<u64>> {
    let column = df.column(name)?.cast(&DataType::UInt64)?;
    Ok(column.u64()?.get(0))
}

fn string_at(df: &DataFrame, name: &str) -> Result<Option<String>> {
    Ok(df.column(name)?.str()?.get(0).map(str::to_string))
}
