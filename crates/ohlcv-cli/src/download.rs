//! The `download` subcommand.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Days, Local, NaiveDate};
use clap::Args;
use ohlcv::process::{add_indicators, validate};
use ohlcv::{
    DATE_FORMAT, DateSpec, DownloadReport, EngineConfig, FetchRequest, FileWriter, OutputFormat,
    ParallelFetchEngine, Period, Symbol, YahooClient, country_tickers, load_tickers_from_file,
    output_path, parse_ticker_list, read_table, write_table,
};
use tracing::{error, info, warn};

use crate::DEFAULT_TICKERS_DIR;
use crate::settings::Settings;
use crate::util::{estimate_download_time, format_time};

const DEFAULT_OUTPUT_DIR: &str = "data/downloads";
const DEFAULT_DAYS: u32 = 365;

#[derive(Debug, Args)]
pub(crate) struct DownloadArgs {
    /// Comma-separated tickers, e.g. AAPL,MSFT
    #[arg(long)]
    tickers: Option<String>,

    /// File with one ticker per line
    #[arg(long)]
    file: Option<PathBuf>,

    /// Country code whose ticker list to download
    #[arg(long)]
    country: Option<String>,

    /// Comma-separated country codes
    #[arg(long)]
    countries: Option<String>,

    /// Root of the per-country ticker lists [default: data/tickers]
    #[arg(long)]
    tickers_dir: Option<PathBuf>,

    /// First day, YYYY-MM-DD [default: end date minus --days]
    #[arg(long)]
    start_date: Option<String>,

    /// Last day, YYYY-MM-DD [default: today]
    #[arg(long)]
    end_date: Option<String>,

    /// Days of history when no start date is given [default: 365]
    #[arg(long)]
    days: Option<u32>,

    /// Named period instead of a date range (1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max)
    #[arg(long, conflicts_with_all = ["start_date", "end_date", "days"])]
    period: Option<Period>,

    /// Download unadjusted prices
    #[arg(long)]
    raw: bool,

    /// Directory for the output files [default: data/downloads]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output format: csv, parquet or json [default: csv]
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Maximum concurrent downloads [default: 50]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Attempts per ticker, including the first [default: 3]
    #[arg(long)]
    retry: Option<u32>,

    /// Seconds before the first retry; doubles on each retry [default: 1]
    #[arg(long)]
    retry_delay: Option<f64>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(long)]
    timeout: Option<f64>,

    /// Add technical indicators to each downloaded file
    #[arg(long)]
    add_indicators: bool,

    /// Validate and clean each downloaded file
    #[arg(long)]
    validate: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub(crate) async fn run(args: DownloadArgs, settings: &Settings) -> Result<()> {
    let tickers_dir = args
        .tickers_dir
        .clone()
        .or_else(|| settings.tickers_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TICKERS_DIR));
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| settings.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let format = args.format.or(settings.format).unwrap_or_default();
    let auto_adjust = !(args.raw || settings.raw.unwrap_or(false));

    let today = Local::now().date_naive();
    let spec = resolve_spec(
        args.start_date.as_deref(),
        args.end_date.as_deref(),
        args.period,
        settings.period,
        args.days.or(settings.days).unwrap_or(DEFAULT_DAYS),
        today,
    )?;

    let entries = collect_entries(&args, &tickers_dir);
    let requests = build_requests(&entries, spec, auto_adjust);
    if requests.is_empty() {
        bail!("No tickers specified. Use --tickers, --file, --country or --countries");
    }

    let config = engine_config(&args, settings)?;

    println!("Downloading data for {} tickers", requests.len());
    println!("{}", describe_spec(spec, today));
    println!(
        "Estimated download time: {}",
        format_time(estimate_download_time(requests.len(), config.max_concurrent))
    );
    println!("Starting download...");

    let engine = ParallelFetchEngine::new(Arc::new(YahooClient::new()), config)?;
    let report = engine
        .fetch_all(&requests, Arc::new(FileWriter::new(format)), &output_dir)
        .await?;

    if args.validate || args.add_indicators {
        post_process(&report, &requests, &output_dir, format, &args);
    }

    print_report(&report, args.json)
}

/// Gathers raw ticker entries from every source given on the command line.
///
/// Unreadable files and unknown countries are logged and skipped.
fn collect_entries(args: &DownloadArgs, tickers_dir: &Path) -> Vec<String> {
    let mut entries = Vec::new();

    if let Some(list) = &args.tickers {
        entries.extend(parse_ticker_list(list));
    }

    if let Some(path) = &args.file {
        match load_tickers_from_file(path) {
            Ok(tickers) => entries.extend(tickers),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not read ticker file"),
        }
    }

    let countries = args
        .country
        .iter()
        .cloned()
        .chain(args.countries.iter().flat_map(|list| parse_ticker_list(list)));
    for country in countries {
        match country_tickers(tickers_dir, &country) {
            Ok(tickers) => {
                info!(country = %country, count = tickers.len(), "Loaded country tickers");
                entries.extend(tickers);
            }
            Err(e) => warn!(country = %country, error = %e, "No tickers found for country"),
        }
    }

    entries
}

/// Parses entries into requests, keeping the first occurrence of each symbol.
fn build_requests(entries: &[String], spec: DateSpec, auto_adjust: bool) -> Vec<FetchRequest> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(|entry| match FetchRequest::parse_entry(entry, spec, auto_adjust) {
            Ok(request) => Some(request),
            Err(e) => {
                warn!(entry = %entry, error = %e, "Skipping ticker entry");
                None
            }
        })
        .filter(|request| seen.insert(request.symbol.clone()))
        .collect()
}

/// Resolves the requested time window.
///
/// An explicit `--period` wins, then explicit dates, then a configured
/// period, then the last `days` days up to today.
fn resolve_spec(
    start: Option<&str>,
    end: Option<&str>,
    period: Option<Period>,
    default_period: Option<Period>,
    days: u32,
    today: NaiveDate,
) -> Result<DateSpec> {
    if let Some(period) = period {
        return Ok(DateSpec::Period(period));
    }
    if let (None, None, Some(period)) = (start, end, default_period) {
        return Ok(DateSpec::Period(period));
    }

    let end = match end {
        Some(s) => parse_date(s, "end")?,
        None => today,
    };
    let start = match start {
        Some(s) => parse_date(s, "start")?,
        None => end
            .checked_sub_days(Days::new(u64::from(days)))
            .with_context(|| format!("--days {days} reaches before the earliest date"))?,
    };

    Ok(DateSpec::range(start, end)?)
}

/// Console line for the requested window; named periods show their dates.
fn describe_spec(spec: DateSpec, today: NaiveDate) -> String {
    match spec {
        DateSpec::Range { start, end } => format!("Date range: {start} to {end}"),
        DateSpec::Period(period) => match period.start_from(today) {
            Some(start) => format!("Period: {period} ({start} to {today})"),
            None => format!("Period: {period} (full history)"),
        },
    }
}

fn parse_date(s: &str, which: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .with_context(|| format!("Invalid {which} date format: {s}. Use YYYY-MM-DD"))
}

fn engine_config(args: &DownloadArgs, settings: &Settings) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(n) = args.concurrency.or(settings.concurrency) {
        config = config.with_max_concurrent(n);
    }
    if let Some(n) = args.retry.or(settings.retry) {
        config = config.with_retry_attempts(n);
    }
    if let Some(secs) = args.retry_delay.or(settings.retry_delay) {
        config = config.with_retry_base_delay(seconds(secs, "retry delay")?);
    }
    if let Some(secs) = args.timeout.or(settings.timeout) {
        config = config.with_timeout(seconds(secs, "timeout")?);
    }
    config.validate()?;
    Ok(config)
}

fn seconds(secs: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid {what}: {secs}"))
}

/// Rewrites each successfully downloaded file with the requested processing.
///
/// Failures are logged; the file is left as downloaded.
fn post_process(
    report: &DownloadReport,
    requests: &[FetchRequest],
    output_dir: &Path,
    format: OutputFormat,
    args: &DownloadArgs,
) {
    let by_symbol: HashMap<&Symbol, &FetchRequest> =
        requests.iter().map(|r| (&r.symbol, r)).collect();

    for symbol in &report.successful_tickers {
        let Some(request) = by_symbol.get(symbol) else {
            continue;
        };
        let path = output_path(output_dir, request, format);
        if let Err(e) = process_file(&path, format, args.validate, args.add_indicators) {
            error!(ticker = %symbol, path = %path.display(), error = %e, "Post-processing failed");
        }
    }
}

fn process_file(path: &Path, format: OutputFormat, check: bool, indicators: bool) -> Result<()> {
    let mut df = read_table(path)?;

    if check {
        let (cleaned, report) = validate(&df)?;
        if !report.is_clean() {
            info!(path = %path.display(), ?report, "Cleaned downloaded data");
        }
        df = cleaned;
    }
    if indicators {
        df = add_indicators(&df)?;
    }

    write_table(&mut df, path, format)?;
    Ok(())
}

fn print_report(report: &DownloadReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Download completed!");
    println!("Total tickers: {}", report.total);
    println!("Successful: {}", report.successful);
    println!("Failed: {}", report.failed);

    if !report.failed_tickers.is_empty() {
        let failed: Vec<&str> = report.failed_tickers.iter().map(Symbol::as_str).collect();
        println!("Failed tickers: {}", failed.join(", "));
    }
    Ok(())
}
