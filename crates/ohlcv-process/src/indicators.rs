//! Technical indicators.
//!
//! All indicators are computed on `close`, per ticker, after sorting by
//! ticker and date. Windows that are not yet full yield nulls.

use ohlcv_core::Result;
use polars::prelude::*;

use crate::frame::{by_ticker_and_date, require_columns};

/// Moving-average windows, each added as `ma_<n>`.
pub const MA_WINDOWS: [usize; 4] = [5, 10, 20, 50];
/// RSI look-back.
pub const RSI_WINDOW: usize = 14;
/// Bollinger Band window.
pub const BB_WINDOW: usize = 20;
/// Bollinger Band width in standard deviations.
pub const BB_STD_DEVS: f64 = 2.0;
/// MACD fast, slow and signal spans.
pub const MACD_SPANS: (usize, usize, usize) = (12, 26, 9);

/// Appends `ma_5/10/20/50`, `rsi`, `macd`, `macd_signal`, `macd_histogram`
/// and `bb_middle/upper/lower`.
///
/// RSI uses simple rolling means of gains and losses. MACD uses
/// non-adjusted exponential means.
pub fn add_indicators(df: &DataFrame) -> Result<DataFrame> {
    if df.height() == 0 {
        return Ok(df.clone());
    }
    require_columns(df, &["date", "close", "ticker"])?;

    let per_ticker = |e: Expr| e.over([col("ticker")]);
    let close = || col("close").cast(DataType::Float64);

    let mut first_pass: Vec<Expr> = MA_WINDOWS
        .iter()
        .map(|&n| per_ticker(close().rolling_mean(full_window(n))).alias(format!("ma_{n}")))
        .collect();

    first_pass.extend([
        per_ticker(close() - close().shift(lit(1))).alias("__delta"),
        per_ticker(ewm(close(), MACD_SPANS.0) - ewm(close(), MACD_SPANS.1)).alias("macd"),
        per_ticker(close().rolling_mean(full_window(BB_WINDOW))).alias("bb_middle"),
        per_ticker(close().rolling_std(full_window(BB_WINDOW))).alias("__bb_std"),
    ]);

    let delta = || col("__delta");
    let gain = when(delta().gt(lit(0.0)))
        .then(delta())
        .otherwise(lit(0.0));
    let loss = when(delta().lt(lit(0.0)))
        .then(lit(0.0) - delta())
        .otherwise(lit(0.0));

    let second_pass = [
        per_ticker(gain.rolling_mean(full_window(RSI_WINDOW))).alias("__avg_gain"),
        per_ticker(loss.rolling_mean(full_window(RSI_WINDOW))).alias("__avg_loss"),
        per_ticker(ewm(col("macd"), MACD_SPANS.2)).alias("macd_signal"),
        (col("bb_middle") + col("__bb_std") * lit(BB_STD_DEVS)).alias("bb_upper"),
        (col("bb_middle") - col("__bb_std") * lit(BB_STD_DEVS)).alias("bb_lower"),
    ];

    let third_pass = [
        (lit(100.0) - lit(100.0) / (lit(1.0) + col("__avg_gain") / col("__avg_loss"))).alias("rsi"),
        (col("macd") - col("macd_signal")).alias("macd_histogram"),
    ];

    let out = df
        .clone()
        .lazy()
        .sort(["ticker", "date"], by_ticker_and_date())
        .with_columns(first_pass)
        .with_columns(second_pass)
        .with_columns(third_pass)
        .drop(["__delta", "__bb_std", "__avg_gain", "__avg_loss"])
        .collect()?;

    Ok(out)
}

fn full_window(size: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size: size,
        min_periods: size,
        ..Default::default()
    }
}

fn ewm(expr: Expr, span: usize) -> Expr {
    expr.ewm_mean(EWMOptions::default().and_span(span).and_adjust(false))
}
