//! Cleaning and consistency checks.

use ohlcv_core::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::frame::{by_ticker_and_date, require_columns};

const REQUIRED: [&str; 7] = ["date", "open", "high", "low", "close", "volume", "ticker"];
const OHLCV: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// What [`validate`] found and changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Rows in the input table.
    pub input_rows: usize,
    /// Rows in the cleaned table.
    pub output_rows: usize,
    /// Rows dropped for a null price or volume.
    pub incomplete_rows: usize,
    /// Rows dropped as repeated `(ticker, date)` pairs.
    pub duplicate_rows: usize,
    /// Rows whose high is below the open, low or close.
    pub invalid_high: usize,
    /// Rows whose low is above the open, high or close.
    pub invalid_low: usize,
    /// Rows whose negative volume was set to zero.
    pub negative_volume: usize,
}

impl ValidationReport {
    /// Returns true when nothing was dropped, flagged or corrected.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.incomplete_rows == 0
            && self.duplicate_rows == 0
            && self.invalid_high == 0
            && self.invalid_low == 0
            && self.negative_volume == 0
    }
}

/// Cleans a table of bars.
///
/// Drops rows with a null price or volume, keeps the first row of each
/// `(ticker, date)` pair and sorts by ticker then date. OHLC violations are
/// counted and logged but left as they are; negative volumes are set to 0.
pub fn validate(df: &DataFrame) -> Result<(DataFrame, ValidationReport)> {
    if df.height() == 0 {
        return Ok((df.clone(), ValidationReport::default()));
    }
    require_columns(df, &REQUIRED)?;

    let mut report = ValidationReport {
        input_rows: df.height(),
        ..Default::default()
    };

    let complete = OHLCV
        .iter()
        .fold(df.clone().lazy(), |lf, name| lf.filter(col(*name).is_not_null()))
        .collect()?;
    report.incomplete_rows = report.input_rows - complete.height();

    let unique = complete
        .clone()
        .lazy()
        .unique_stable(
            Some(vec!["ticker".into(), "date".into()]),
            UniqueKeepStrategy::First,
        )
        .sort(["ticker", "date"], by_ticker_and_date())
        .collect()?;
    report.duplicate_rows = complete.height() - unique.height();

    let counts = unique
        .clone()
        .lazy()
        .select([
            count_true(
                col("high")
                    .lt(col("open"))
                    .or(col("high").lt(col("low")))
                    .or(col("high").lt(col("close"))),
            )
            .alias("invalid_high"),
            count_true(
                col("low")
                    .gt(col("open"))
                    .or(col("low").gt(col("high")))
                    .or(col("low").gt(col("close"))),
            )
            .alias("invalid_low"),
            count_true(col("volume").lt(lit(0))).alias("negative_volume"),
        ])
        .collect()?;

    report.invalid_high = scalar_count(&counts, "invalid_high")?;
    report.invalid_low = scalar_count(&counts, "invalid_low")?;
    report.negative_volume = scalar_count(&counts, "negative_volume")?;

    if report.invalid_high > 0 || report.invalid_low > 0 {
        warn!(
            invalid_high = report.invalid_high,
            invalid_low = report.invalid_low,
            "Found inconsistent OHLC rows"
        );
    }

    let cleaned = if report.negative_volume > 0 {
        warn!(rows = report.negative_volume, "Found negative volume, setting to 0");
        let volume_type = unique.column("volume")?.dtype().clone();
        unique
            .lazy()
            .with_column(
                when(col("volume").lt(lit(0)))
                    .then(lit(0).cast(volume_type))
                    .otherwise(col("volume"))
                    .alias("volume"),
            )
            .collect()?
    } else {
        unique
    };

    report.output_rows = cleaned.height();
    debug!(?report, "Validated table");
    Ok((cleaned, report))
}

fn count_true(mask: Expr) -> Expr {
    mask.cast(DataType::UInt64).sum()
}

fn scalar_count(df: &DataFrame, name: &str) -> Result<usize> {
    let column = df.column(name)?.cast(&DataType::UInt64)?;
    Ok(column.u64()?.get(0).unwrap_or(0) as usize)
}
