//! Bar resampling.

use ohlcv_core::{DATE_FORMAT, Frequency, Result};
use polars::prelude::*;
use tracing::debug;

use crate::frame::{by_ticker_and_date, date_expr, require_columns};

/// Aggregates bars to `frequency`, per ticker.
///
/// Each bucket takes the first open, highest high, lowest low, last close
/// and summed volume, and is labelled by the first calendar day of its
/// period (Monday for weeks). The result has the columns
/// `date, open, high, low, close, volume, ticker`.
pub fn resample(df: &DataFrame, frequency: Frequency) -> Result<DataFrame> {
    if df.height() == 0 {
        return Ok(df.clone());
    }
    require_columns(df, &["date", "open", "high", "low", "close", "volume", "ticker"])?;

    let date = date_expr(df)?;
    let out = df
        .clone()
        .lazy()
        .with_column(date.alias("date"))
        .sort(["ticker", "date"], by_ticker_and_date())
        .with_column(
            col("date")
                .dt()
                .truncate(lit(frequency.truncate_every()))
                .alias("date"),
        )
        .group_by_stable([col("ticker"), col("date")])
        .agg([
            col("open").first(),
            col("high").max(),
            col("low").min(),
            col("close").last(),
            col("volume").sum(),
        ])
        .filter(col("close").is_not_null())
        .select([
            col("date").dt().strftime(DATE_FORMAT),
            col("open"),
            col("high"),
            col("low"),
            col("close"),
            col("volume"),
            col("ticker"),
        ])
        .collect()?;

    debug!(?frequency, before = df.height(), after = out.height(), "Resampled");
    Ok(out)
}
