//! Ticker-list sources.
//!
//! Ticker lists come from three places: a comma-separated string, a text
//! file with one entry per line, or a per-country directory layout
//! (`<dir>/<cc>/<cc>.txt`). Entries are returned verbatim apart from
//! trimming; an entry may carry a display name after a comma
//! (`AAPL, Apple Inc`), which [`FetchRequest::parse_entry`] splits off.
//!
//! [`FetchRequest::parse_entry`]: ohlcv_core::FetchRequest::parse_entry

use std::fs;
use std::path::{Path, PathBuf};

use ohlcv_core::{DataError, Result};
use tracing::debug;

/// Country whose tickers are split across one file per exchange board.
const SPLIT_COUNTRY: &str = "cn";

/// Splits a comma-separated ticker string into trimmed, non-empty entries.
#[must_use]
pub fn parse_ticker_list(tickers: &str) -> Vec<String> {
    tickers
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads ticker entries from a file, one per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_tickers_from_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| DataError::Io(format!("reading tickers from {}: {e}", path.display())))?;

    let tickers: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    debug!(path = %path.display(), count = tickers.len(), "Loaded ticker file");
    Ok(tickers)
}

/// Loads the tickers of one country from `dir/<country>/<country>.txt`.
///
/// China is split by board: every `*.txt` under `dir/cn/` except the
/// `cn.txt` index is read, in file-name order.
pub fn country_tickers(dir: &Path, country: &str) -> Result<Vec<String>> {
    let country = country.trim().to_ascii_lowercase();
    let country_dir = dir.join(&country);

    if country != SPLIT_COUNTRY {
        return load_tickers_from_file(&country_dir.join(format!("{country}.txt")));
    }

    let index_name = format!("{country}.txt");
    let mut files: Vec<PathBuf> = fs::read_dir(&country_dir)
        .map_err(|e| DataError::Io(format!("reading {}: {e}", country_dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "txt")
                && path.file_name().is_some_and(|name| name != index_name.as_str())
        })
        .collect();
    files.sort();

    let mut tickers = Vec::new();
    for file in &files {
        tickers.extend(load_tickers_from_file(file)?);
    }
    Ok(tickers)
}

/// Lists the country codes with a ticker directory under `dir`, sorted.
///
/// A missing `dir` yields an empty list.
pub fn available_countries(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut countries: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    countries.sort();
    Ok(countries)
}
