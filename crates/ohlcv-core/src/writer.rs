//! Writer trait for persisting normalized tables.
//!
//! This module defines the [`TableWriter`] trait and the [`OutputFormat`]
//! it serializes to.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DataError, Result},
    types::Symbol,
};

/// On-disk serialization format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values with a header row.
    #[default]
    Csv,
    /// Apache Parquet.
    Parquet,
    /// JSON array of row objects.
    Json,
}

impl OutputFormat {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Json => "json",
        }
    }

    /// Infers the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                DataError::InvalidParameter(format!("{} has no file extension", path.display()))
            })?
            .parse()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = DataError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            other => Err(DataError::InvalidParameter(format!(
                "unsupported format '{other}', expected csv, parquet or json"
            ))),
        }
    }
}

/// Trait for persisting one ticker's normalized table.
///
/// Writes must be idempotent: writing the same table to the same path twice
/// leaves the same bytes on disk.
#[async_trait]
pub trait TableWriter: Send + Sync + fmt::Debug {
    /// Format this writer produces; decides the file extension.
    fn format(&self) -> OutputFormat;

    /// Writes `table` to `path`, replacing any previous file.
    async fn write(&self, symbol: &Symbol, table: &DataFrame, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            OutputFormat::from_path(Path::new("out/AAPL_1y_adj.parquet")).unwrap(),
            OutputFormat::Parquet
        );
        assert!(OutputFormat::from_path(Path::new("README")).is_err());
        assert!(OutputFormat::from_path(Path::new("x.xlsx")).is_err());
    }

    #[test]
    fn test_format_display() {
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
    }
}
