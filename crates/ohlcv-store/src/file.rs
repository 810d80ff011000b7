//! File-backed table writer.

use std::fs::{self, File};
use std::path::Path;

use async_trait::async_trait;
use ohlcv_core::{DataError, OutputFormat, Result, Symbol, TableWriter};
use polars::prelude::*;
use tracing::{debug, instrument};

/// Writes tables to disk in a fixed [`OutputFormat`].
///
/// Each write lands in its own temporary file next to `path` and is then
/// renamed over it, so readers never observe a half-written file and
/// concurrent writes to one path never share a temporary file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriter {
    format: OutputFormat,
}

impl FileWriter {
    /// Create a writer for the given format.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl TableWriter for FileWriter {
    fn format(&self) -> OutputFormat {
        self.format
    }

    #[instrument(skip(self, table), fields(symbol = %symbol, rows = table.height(), format = %self.format))]
    async fn write(&self, symbol: &Symbol, table: &DataFrame, path: &Path) -> Result<()> {
        let mut table = table.clone();
        let path = path.to_path_buf();
        let format = self.format;

        tokio::task::spawn_blocking(move || write_table(&mut table, &path, format))
            .await
            .map_err(|e| DataError::Io(format!("writer task failed: {e}")))??;

        debug!("Wrote table");
        Ok(())
    }
}

/// Writes `df` to `path` in `format`, atomically replacing any existing file.
pub fn write_table(df: &mut DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".ohlcv-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| DataError::Io(format!("creating temp file in {}: {e}", parent.display())))?;
    write_to(df, tmp.as_file_mut(), format, path)?;

    tmp.persist(path).map_err(|e| {
        DataError::Io(format!("atomic rename to {} failed: {}", path.display(), e.error))
    })?;
    Ok(())
}

fn write_to(df: &mut DataFrame, file: &mut File, format: OutputFormat, path: &Path) -> Result<()> {
    let written = match format {
        OutputFormat::Csv => CsvWriter::new(&mut *file).include_header(true).finish(df),
        OutputFormat::Parquet => ParquetWriter::new(&mut *file).finish(df).map(|_| ()),
        OutputFormat::Json => JsonWriter::new(&mut *file)
            .with_json_format(JsonFormat::Json)
            .finish(df),
    };
    written.map_err(|e| DataError::Io(format!("{}: {e}", path.display())))?;
    file.sync_all()?;
    Ok(())
}

/// Reads a table from `path`, choosing the format from the file extension.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let format = OutputFormat::from_path(path)?;

    let df = match format {
        OutputFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        OutputFormat::Parquet => ParquetReader::new(File::open(path)?).finish()?,
        OutputFormat::Json => JsonReader::new(File::open(path)?)
            .with_json_format(JsonFormat::Json)
            .finish()?,
    };

    debug!(path = %path.display(), rows = df.height(), "Read table");
    Ok(df)
}
