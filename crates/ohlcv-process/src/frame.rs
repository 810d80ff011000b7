//! Date filtering, merging and shared column helpers.

use chrono::NaiveDate;
use ohlcv_core::{DATE_FORMAT, DataError, Result};
use polars::prelude::*;
use tracing::debug;

/// Fails with [`DataError::InvalidParameter`] unless every column is present.
pub(crate) fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| df.column(c).is_err())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::InvalidParameter(format!(
            "missing columns: {}",
            missing.join(", ")
        )))
    }
}

/// Expression reading the `date` column as a polars `Date`.
///
/// Accepts `YYYY-MM-DD` strings as well as date and datetime columns.
pub(crate) fn date_expr(df: &DataFrame) -> Result<Expr> {
    match df.column("date")?.dtype() {
        DataType::String => Ok(col("date").str().to_date(StrptimeOptions {
            format: Some(DATE_FORMAT.into()),
            ..Default::default()
        })),
        DataType::Date => Ok(col("date")),
        DataType::Datetime(_, _) => Ok(col("date").cast(DataType::Date)),
        other => Err(DataError::InvalidParameter(format!(
            "date column has unsupported type {other}"
        ))),
    }
}

/// Ascending `(ticker, date)` sort that keeps the input order of ties.
pub(crate) fn by_ticker_and_date() -> SortMultipleOptions {
    SortMultipleOptions::default().with_maintain_order(true)
}

/// Keeps rows whose date lies in `start..=end`.
pub fn filter_by_date_range(df: &DataFrame, start: NaiveDate, end: NaiveDate) -> Result<DataFrame> {
    if start > end {
        return Err(DataError::InvalidParameter(format!(
            "start date {start} is after end date {end}"
        )));
    }
    if df.height() == 0 {
        return Ok(df.clone());
    }

    let date = date_expr(df)?;
    let filtered = df
        .clone()
        .lazy()
        .filter(date.clone().gt_eq(lit(start)).and(date.lt_eq(lit(end))))
        .collect()?;

    debug!(
        before = df.height(),
        after = filtered.height(),
        "Filtered by date range"
    );
    Ok(filtered)
}

/// Stacks tables vertically, optionally dropping exact duplicate rows.
///
/// Column types are widened to a common supertype. No input yields an
/// empty table.
pub fn merge_frames(frames: Vec<DataFrame>, dedupe: bool) -> Result<DataFrame> {
    if frames.is_empty() {
        return Ok(DataFrame::empty());
    }

    let inputs = frames.len();
    let lazy: Vec<LazyFrame> = frames.into_iter().map(IntoLazy::lazy).collect();
    let mut merged = concat(
        lazy,
        UnionArgs {
            to_supertypes: true,
            ..Default::default()
        },
    )?;

    if dedupe {
        merged = merged.unique_stable(None, UniqueKeepStrategy::First);
    }

    let merged = merged.collect()?;
    debug!(inputs, rows = merged.height(), "Merged tables");
    Ok(merged)
}
