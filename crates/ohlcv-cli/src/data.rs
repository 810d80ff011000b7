//! The `data` subcommands: operations on downloaded files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Subcommand;
use ohlcv::process::{
    DataSummary, add_indicators, calculate_returns, filter_by_date_range, merge_frames, resample,
    summarize, validate,
};
use ohlcv::{DATE_FORMAT, Frequency, OutputFormat, read_table, write_table};
use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::util::format_file_size;

#[derive(Debug, Subcommand)]
pub(crate) enum DataCommand {
    /// Merge every file of one format in a directory into a single file
    Merge {
        /// Directory holding the files to merge
        input_dir: PathBuf,

        /// Merged output file
        output_file: PathBuf,

        /// Format of the input files
        #[arg(long, default_value = "csv")]
        format: OutputFormat,

        /// Keep repeated (ticker, date) rows
        #[arg(long)]
        keep_duplicates: bool,
    },

    /// Clean, enrich or resample a file
    Process {
        /// Input file
        file: PathBuf,

        /// Drop incomplete and duplicate rows
        #[arg(long)]
        validate: bool,

        /// Add moving averages, RSI, Bollinger bands and MACD
        #[arg(long)]
        add_indicators: bool,

        /// Add daily, log and cumulative returns
        #[arg(long)]
        returns: bool,

        /// Resample to D, W or M bars
        #[arg(long)]
        resample: Option<Frequency>,

        /// Output file [default: overwrite the input]
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print summary statistics of a file
    Summary {
        /// Input file
        file: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep only the rows inside a date range
    Filter {
        /// Input file
        file: PathBuf,

        /// First day kept, YYYY-MM-DD
        #[arg(long)]
        start_date: String,

        /// Last day kept, YYYY-MM-DD
        #[arg(long)]
        end_date: String,

        /// Output file [default: filtered_<name> next to the input]
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

pub(crate) fn run(command: DataCommand) -> Result<()> {
    match command {
        DataCommand::Merge {
            input_dir,
            output_file,
            format,
            keep_duplicates,
        } => merge(&input_dir, &output_file, format, keep_duplicates),
        DataCommand::Process {
            file,
            validate,
            add_indicators,
            returns,
            resample,
            output,
        } => {
            let output = output.unwrap_or_else(|| file.clone());
            let steps = Steps {
                validate,
                indicators: add_indicators,
                returns,
                resample,
            };
            process(&file, &output, steps)
        }
        DataCommand::Summary { file, json } => summary(&file, json),
        DataCommand::Filter {
            file,
            start_date,
            end_date,
            output,
        } => {
            let start = parse_date(&start_date, "start")?;
            let end = parse_date(&end_date, "end")?;
            let output = output.unwrap_or_else(|| filtered_path(&file));
            filter(&file, &output, start, end)
        }
    }
}

fn merge(input_dir: &Path, output: &Path, format: OutputFormat, keep_duplicates: bool) -> Result<()> {
    let files = files_with_extension(input_dir, format.extension(), output)?;
    if files.is_empty() {
        bail!("No {format} files found in {}", input_dir.display());
    }
    println!("Found {} files to merge", files.len());

    let mut frames = Vec::with_capacity(files.len());
    for file in &files {
        match read_table(file) {
            Ok(df) => frames.push(df),
            Err(e) => warn!(path = %file.display(), error = %e, "Skipping unreadable file"),
        }
    }
    if frames.is_empty() {
        bail!("None of the {} files could be read", files.len());
    }

    let merged_count = frames.len();
    let mut merged = merge_frames(frames, !keep_duplicates)?;
    let out_format = OutputFormat::from_path(output).unwrap_or(format);
    write_table(&mut merged, output, out_format)?;

    println!(
        "Successfully merged {merged_count} files into {}",
        output.display()
    );
    println!("Total rows: {}", merged.height());
    print_file_size(output);
    Ok(())
}

/// Files in `dir` with the given extension, sorted, excluding `exclude`.
fn files_with_extension(dir: &Path, extension: &str, exclude: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == extension)
                && path != exclude
        })
        .collect();
    files.sort();
    Ok(files)
}

#[derive(Clone, Copy, Debug, Default)]
struct Steps {
    validate: bool,
    indicators: bool,
    returns: bool,
    resample: Option<Frequency>,
}

fn process(input: &Path, output: &Path, steps: Steps) -> Result<()> {
    let df = read_table(input)?;
    println!(
        "Loaded data with {} rows and {} columns",
        df.height(),
        df.width()
    );

    let mut df = apply_steps(df, steps)?;
    let format = OutputFormat::from_path(output)?;
    write_table(&mut df, output, format)?;

    println!("Saved processed data to {}", output.display());
    println!("Final data has {} rows and {} columns", df.height(), df.width());
    Ok(())
}

fn apply_steps(mut df: DataFrame, steps: Steps) -> Result<DataFrame> {
    if steps.validate {
        let (cleaned, report) = validate(&df)?;
        println!(
            "Validated data: {} rows kept of {}",
            report.output_rows, report.input_rows
        );
        df = cleaned;
    }
    if steps.indicators {
        df = add_indicators(&df)?;
        println!("Added technical indicators");
    }
    if steps.returns {
        df = calculate_returns(&df)?;
        println!("Calculated returns");
    }
    if let Some(frequency) = steps.resample {
        df = resample(&df, frequency)?;
        info!(?frequency, rows = df.height(), "Resampled");
        println!("Resampled data to {frequency:?} frequency");
    }
    Ok(df)
}

fn summary(file: &Path, json: bool) -> Result<()> {
    let df = read_table(file)?;
    let summary = summarize(&df)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(file, &summary);
    }
    Ok(())
}

fn print_summary(file: &Path, summary: &DataSummary) {
    println!("Data Summary for {}", file.display());
    println!("Total records: {}", summary.total_records);
    println!("Unique tickers: {}", summary.unique_tickers);
    if let Some(range) = &summary.date_range {
        println!("Date range: {} to {}", range.start, range.end);
    }

    let price = &summary.price_stats;
    if let (Some(min), Some(max), Some(mean), Some(median)) = (
        price.min_close,
        price.max_close,
        price.mean_close,
        price.median_close,
    ) {
        println!("Close price: min {min:.4}, max {max:.4}, mean {mean:.4}, median {median:.4}");
    }

    let volume = &summary.volume_stats;
    println!("Total volume: {}", volume.total_volume);
    if let (Some(mean), Some(median)) = (volume.mean_volume, volume.median_volume) {
        println!("Volume: mean {mean:.0}, median {median:.0}");
    }
}

fn filter(input: &Path, output: &Path, start: NaiveDate, end: NaiveDate) -> Result<()> {
    let df = read_table(input)?;
    let mut filtered = filter_by_date_range(&df, start, end)?;
    let format = OutputFormat::from_path(output)?;
    write_table(&mut filtered, output, format)?;

    println!(
        "Filtered {} rows to {} rows",
        df.height(),
        filtered.height()
    );
    println!("Saved filtered data to {}", output.display());
    Ok(())
}

/// `dir/filtered_<name>` for an input `dir/<name>`.
fn filtered_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map_or_else(|| "data".into(), |n| n.to_string_lossy());
    input.with_file_name(format!("filtered_{name}"))
}

fn parse_date(s: &str, which: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .with_context(|| format!("Invalid {which} date format: {s}. Use YYYY-MM-DD"))
}

fn print_file_size(path: &Path) {
    match std::fs::metadata(path) {
        Ok(meta) => println!("Output file size: {}", format_file_size(meta.len())),
        Err(e) => warn!(path = %path.display(), error = %e, "Could not stat output file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use tempfile::TempDir;

    fn bars(ticker: &str, dates: &[&str], closes: &[f64]) -> DataFrame {
        let n = dates.len();
        df!(
            "date" => dates,
            "open" => closes,
            "high" => closes.iter().map(|c| c + 1.0).collect::<Vec<_>>(),
            "low" => closes.iter().map(|c| c - 1.0).collect::<Vec<_>>(),
            "close" => closes,
            "volume" => vec![1_000u64; n],
            "dividends" => vec![0.0; n],
            "stock_splits" => vec![0.0; n],
            "ticker" => vec![ticker; n],
        )
        .unwrap()
    }

    #[test]
    fn test_filtered_path() {
        assert_eq!(
            filtered_path(Path::new("data/AAPL_1y_adj.csv")),
            PathBuf::from("data/filtered_AAPL_1y_adj.csv")
        );
    }

    #[test]
    fn test_files_with_extension() {
        let dir = TempDir::new().unwrap();
        for name in ["b.csv", "a.csv", "c.parquet", "merged.csv"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = files_with_extension(dir.path(), "csv", &dir.path().join("merged.csv")).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_merge_directory() {
        let dir = TempDir::new().unwrap();
        let mut aapl = bars("AAPL", &["2024-01-02", "2024-01-03"], &[185.0, 184.0]);
        let mut msft = bars("MSFT", &["2024-01-02"], &[370.0]);
        write_table(&mut aapl, &dir.path().join("AAPL.csv"), OutputFormat::Csv).unwrap();
        write_table(&mut msft, &dir.path().join("MSFT.csv"), OutputFormat::Csv).unwrap();

        let output = dir.path().join("all.parquet");
        merge(dir.path(), &output, OutputFormat::Csv, false).unwrap();

        let merged = read_table(&output).unwrap();
        assert_eq!(merged.height(), 3);
    }

    #[test]
    fn test_filter_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("AAPL.csv");
        let mut df = bars(
            "AAPL",
            &["2024-01-02", "2024-01-03", "2024-01-04"],
            &[185.0, 184.0, 182.0],
        );
        write_table(&mut df, &input, OutputFormat::Csv).unwrap();

        let output = filtered_path(&input);
        filter(
            &input,
            &output,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        )
        .unwrap();

        assert_eq!(read_table(&output).unwrap().height(), 2);
    }

    #[test]
    fn test_apply_steps() {
        let df = bars(
            "AAPL",
            &["2024-01-02", "2024-01-03", "2024-01-03"],
            &[185.0, 184.0, 184.0],
        );
        let steps = Steps {
            validate: true,
            returns: true,
            ..Default::default()
        };

        let out = apply_steps(df, steps).unwrap();
        assert_eq!(out.height(), 2);
        assert!(out.column("daily_return").is_ok());
    }
}
