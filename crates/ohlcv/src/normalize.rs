//! Conversion of provider tables to the canonical schema.
//!
//! Providers label their columns however they like (`Date`, `Stock Splits`,
//! ...). Labels are matched case-insensitively with spaces read as
//! underscores, so `Stock Splits` feeds `stock_splits`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ohlcv_core::{
    CANONICAL_COLUMNS, DataError, FetchRequest, OutputFormat, PRICE_COLUMNS, Result, Symbol,
};
use polars::prelude::*;

/// Decimal places kept for prices.
pub const PRICE_DECIMALS: u32 = 4;

/// Columns filled with zeros when the provider omits them.
const OPTIONAL_COLUMNS: [&str; 2] = ["dividends", "stock_splits"];

/// Scratch name for the reformatted date column.
const DATE_SCRATCH: &str = "__ohlcv_date";

/// Converts a raw provider table into the canonical schema.
///
/// The result has exactly the columns `date, open, high, low, close, volume,
/// dividends, stock_splits, ticker`, in that order. Dates are `YYYY-MM-DD`
/// strings, sorted ascending and unique (the first row for a date wins).
/// Prices are rounded to four decimals and volume is a non-negative
/// `UInt64` (null and negative values become 0).
///
/// A missing date, price or volume column is a [`DataError::Parse`].
pub fn normalize(raw: &DataFrame, symbol: &Symbol) -> Result<DataFrame> {
    let labels: HashMap<String, PlSmallStr> = raw
        .get_column_names()
        .into_iter()
        .map(|name| (canonical_label(name), name.clone()))
        .collect();

    let required = |name: &str| {
        labels.get(name).cloned().ok_or_else(|| {
            DataError::Parse(format!("{symbol}: provider table has no '{name}' column"))
        })
    };

    let dates = date_strings(raw.column(&required("date")?)?)?;
    let mut frame = raw.clone();
    frame.with_column(dates.with_name(DATE_SCRATCH.into()))?;

    let mut exprs = Vec::with_capacity(CANONICAL_COLUMNS.len());
    exprs.push(col(DATE_SCRATCH).alias("date"));

    for name in PRICE_COLUMNS {
        exprs.push(
            col(required(name)?)
                .cast(DataType::Float64)
                .round(PRICE_DECIMALS)
                .alias(name),
        );
    }

    let volume = col(required("volume")?).cast(DataType::Float64);
    exprs.push(
        when(volume.clone().gt_eq(lit(0.0)))
            .then(volume)
            .otherwise(lit(0.0))
            .cast(DataType::UInt64)
            .alias("volume"),
    );

    for name in OPTIONAL_COLUMNS {
        let expr = match labels.get(name) {
            Some(source) => col(source.clone())
                .cast(DataType::Float64)
                .fill_null(lit(0.0)),
            None => lit(0.0),
        };
        exprs.push(expr.alias(name));
    }

    exprs.push(lit(symbol.as_str()).alias("ticker"));

    let normalized = frame
        .lazy()
        .select(exprs)
        .filter(col("date").is_not_null())
        .sort(
            ["date"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .unique_stable(Some(vec!["date".into()]), UniqueKeepStrategy::First)
        .collect()?;

    Ok(normalized)
}

/// Path of the file a request is written to.
#[must_use]
pub fn output_path(output_dir: &Path, request: &FetchRequest, format: OutputFormat) -> PathBuf {
    output_dir.join(request.file_name(format.extension()))
}

fn canonical_label(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(' ', "_")
}

/// Renders a date, datetime or string column as `YYYY-MM-DD` strings.
fn date_strings(column: &Column) -> Result<Column> {
    let text = match column.dtype() {
        DataType::String => column.clone(),
        DataType::Date | DataType::Datetime(_, _) => {
            column.cast(&DataType::Date)?.cast(&DataType::String)?
        }
        other => {
            return Err(DataError::Parse(format!(
                "unsupported date column type {other}"
            )));
        }
    };

    let days: StringChunked = text
        .str()?
        .into_iter()
        .map(|d| d.map(|s| s.get(..10).unwrap_or(s).to_string()))
        .collect();

    Ok(days.into_series().into())
}
