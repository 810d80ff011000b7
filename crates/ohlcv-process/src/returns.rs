//! Return series.

use std::f64::consts::E;

use ohlcv_core::Result;
use polars::prelude::*;

use crate::frame::{by_ticker_and_date, require_columns};

/// Appends `daily_return`, `log_return` and `cumulative_return`.
///
/// Returns are computed per ticker on `close`, so the first row of every
/// ticker is null. `cumulative_return` is the running sum of daily returns.
pub fn calculate_returns(df: &DataFrame) -> Result<DataFrame> {
    if df.height() == 0 {
        return Ok(df.clone());
    }
    require_columns(df, &["date", "close", "ticker"])?;

    let close = || col("close").cast(DataType::Float64);
    let ratio = || close() / close().shift(lit(1));

    let out = df
        .clone()
        .lazy()
        .sort(["ticker", "date"], by_ticker_and_date())
        .with_columns([
            (ratio() - lit(1.0)).over([col("ticker")]).alias("daily_return"),
            ratio().log(E).over([col("ticker")]).alias("log_return"),
        ])
        .with_column(
            col("daily_return")
                .cum_sum(false)
                .over([col("ticker")])
                .alias("cumulative_return"),
        )
        .collect()?;

    Ok(out)
}
