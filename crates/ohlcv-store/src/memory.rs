//! In-memory writer implementation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ohlcv_core::{DataError, OutputFormat, Result, Symbol, TableWriter};
use polars::prelude::DataFrame;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Simple in-memory writer for testing and development.
///
/// Tables are stored in a `RwLock`-protected `HashMap` keyed by output path
/// and are lost when the writer is dropped. Writing the same path twice
/// replaces the earlier table.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    format: OutputFormat,
    tables: RwLock<HashMap<PathBuf, DataFrame>>,
    failing: HashSet<Symbol>,
}

impl MemoryWriter {
    /// Create a new empty in-memory writer reporting CSV as its format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the format reported to the engine, which decides file extensions.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Make every write for `symbol` fail with an I/O error.
    #[must_use]
    pub fn with_failure_for(mut self, symbol: impl Into<Symbol>) -> Self {
        self.failing.insert(symbol.into());
        self
    }

    /// Returns the table stored at `path`, if any.
    pub async fn get(&self, path: &Path) -> Option<DataFrame> {
        self.tables.read().await.get(path).cloned()
    }

    /// Returns all stored paths, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.tables.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of stored tables.
    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Returns true when nothing has been written.
    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }
}

#[async_trait]
impl TableWriter for MemoryWriter {
    fn format(&self) -> OutputFormat {
        self.format
    }

    #[instrument(skip(self, table), fields(symbol = %symbol, rows = table.height()))]
    async fn write(&self, symbol: &Symbol, table: &DataFrame, path: &Path) -> Result<()> {
        if self.failing.contains(symbol) {
            return Err(DataError::Io(format!(
                "refusing to write {} for {symbol}",
                path.display()
            )));
        }

        let mut tables = self.tables.write().await;
        tables.insert(path.to_path_buf(), table.clone());
        debug!("Stored table in memory");
        Ok(())
    }
}
