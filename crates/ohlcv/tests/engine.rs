//! Contract tests for the parallel fetch engine, using scripted clients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ohlcv::{
    DataError, DataProvider, DateSpec, DownloadReport, EngineConfig, FailureReason, FetchClient,
    FetchQuery, FetchRequest, FileWriter, MemoryWriter, OutputFormat, ParallelFetchEngine, Period,
    Result, Symbol, TableWriter, read_table,
};
use polars::prelude::*;
use tempfile::TempDir;
use tokio::time::Instant;

type Script = Box<dyn Fn(&Symbol, u32) -> Result<DataFrame> + Send + Sync>;

/// Client whose answers come from a closure of `(symbol, attempt)`.
///
/// Records the instant of every call and the peak number of calls in flight.
struct ScriptedClient {
    script: Script,
    delay: Duration,
    calls: Mutex<HashMap<Symbol, Vec<Instant>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl std::fmt::Debug for ScriptedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedClient").finish_non_exhaustive()
    }
}

impl ScriptedClient {
    fn new(script: impl Fn(&Symbol, u32) -> Result<DataFrame> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self, symbol: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .get(&Symbol::new(symbol))
            .cloned()
            .unwrap_or_default()
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl DataProvider for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn description(&self) -> &str {
        "Scripted test client"
    }
}

#[async_trait]
impl FetchClient for ScriptedClient {
    async fn fetch(&self, query: &FetchQuery) -> Result<DataFrame> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let times = calls.entry(query.symbol.clone()).or_default();
            times.push(Instant::now());
            times.len() as u32
        };

        let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.script)(&query.symbol, attempt)
    }
}

/// Three deterministic bars with provider-style labels.
fn bars(symbol: &Symbol) -> DataFrame {
    let base = 100.0 + symbol.as_str().len() as f64;
    df!(
        "Date" => &["2023-01-03", "2023-01-04", "2023-01-05"],
        "Open" => &[base, base + 1.0, base + 2.0],
        "High" => &[base + 1.5, base + 2.5, base + 3.5],
        "Low" => &[base - 1.0, base, base + 1.0],
        "Close" => &[base + 1.0, base + 2.0, base + 3.0],
        "Volume" => &[1_000u64, 2_000, 3_000],
        "Dividends" => &[0.0, 0.0, 0.0],
        "Stock Splits" => &[0.0, 0.0, 0.0],
    )
    .unwrap()
}

fn always_ok(symbol: &Symbol, _attempt: u32) -> Result<DataFrame> {
    Ok(bars(symbol))
}

fn network_error() -> DataError {
    DataError::Network("connection reset".to_string())
}

fn requests(symbols: &[&str]) -> Vec<FetchRequest> {
    symbols
        .iter()
        .map(|s| FetchRequest::new(*s, DateSpec::Period(Period::OneYear)))
        .collect()
}

fn fast_config() -> EngineConfig {
    EngineConfig::default().with_retry_base_delay(Duration::from_millis(1))
}

fn engine(client: Arc<ScriptedClient>, config: EngineConfig) -> ParallelFetchEngine {
    ParallelFetchEngine::new(client, config).unwrap()
}

fn reason_of(report: &DownloadReport, symbol: &str) -> FailureReason {
    report
        .failures
        .iter()
        .find(|f| f.ticker.as_str() == symbol)
        .map(|f| f.reason)
        .unwrap()
}

#[tokio::test]
async fn test_all_succeed() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(always_ok));
    let writer = Arc::new(MemoryWriter::new());

    let report = engine(client, fast_config())
        .fetch_all(&requests(&["AAPL", "MSFT", "GOOG"]), writer.clone(), dir.path())
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.successful, 3);
    assert!(report.all_succeeded());
    assert!(report.failures.is_empty());

    let stored = writer.get(&dir.path().join("MSFT_1y_adj.csv")).await.unwrap();
    assert_eq!(stored.height(), 3);
    assert_eq!(
        stored.column("ticker").unwrap().str().unwrap().get(0),
        Some("MSFT")
    );
}

#[tokio::test]
async fn test_every_request_lands_in_exactly_one_list() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|symbol, attempt| {
        match symbol.as_str() {
            "ZZZZ" => Ok(DataFrame::empty()),
            "DOWN" => Err(network_error()),
            "FLAKY" if attempt == 1 => Err(network_error()),
            _ => Ok(bars(symbol)),
        }
    }));
    let writer = Arc::new(MemoryWriter::new());
    let symbols = ["AAPL", "ZZZZ", "DOWN", "FLAKY", "AAPL", "MSFT"];

    let report = engine(client.clone(), fast_config())
        .fetch_all(&requests(&symbols), writer, dir.path())
        .await
        .unwrap();

    assert_eq!(report.total, symbols.len());
    assert_eq!(report.successful + report.failed, report.total);
    assert!(report.is_complete());

    let mut seen: Vec<&str> = report
        .successful_tickers
        .iter()
        .chain(&report.failed_tickers)
        .map(Symbol::as_str)
        .collect();
    seen.sort_unstable();
    let mut expected = symbols.to_vec();
    expected.sort_unstable();
    assert_eq!(seen, expected);

    assert_eq!(report.successful, 4);
    assert_eq!(reason_of(&report, "ZZZZ"), FailureReason::NoData);
    assert_eq!(reason_of(&report, "DOWN"), FailureReason::Fetch);
    assert_eq!(client.calls("FLAKY").len(), 2);
    assert_eq!(client.calls("AAPL").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_back_off_exponentially() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|_, _| Err(network_error())));
    let config = EngineConfig::default()
        .with_retry_attempts(4)
        .with_retry_base_delay(Duration::from_secs(1));

    let report = engine(client.clone(), config)
        .fetch_all(&requests(&["AAPL"]), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(reason_of(&report, "AAPL"), FailureReason::Fetch);

    let calls = client.calls("AAPL");
    assert_eq!(calls.len(), 4);
    let expected = [1, 2, 4].map(Duration::from_secs);
    for (window, want) in calls.windows(2).zip(expected) {
        let gap = window[1] - window[0];
        assert!(gap >= want, "gap {gap:?} shorter than {want:?}");
        assert!(gap < want + Duration::from_millis(10), "gap {gap:?} longer than {want:?}");
    }
}

#[tokio::test]
async fn test_empty_table_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|_, _| Ok(DataFrame::empty())));

    let report = engine(client.clone(), fast_config())
        .fetch_all(&requests(&["ZZZZ"]), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.failed_tickers, vec![Symbol::new("ZZZZ")]);
    assert_eq!(reason_of(&report, "ZZZZ"), FailureReason::NoData);
    assert_eq!(client.calls("ZZZZ").len(), 1);
}

#[tokio::test]
async fn test_malformed_table_is_retried_like_other_failures() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|symbol, _| {
        Ok(bars(symbol).drop("Close").unwrap())
    }));

    let report = engine(client.clone(), fast_config())
        .fetch_all(&requests(&["AAPL"]), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(reason_of(&report, "AAPL"), FailureReason::Fetch);
    assert_eq!(client.calls("AAPL").len(), 3);
}

#[tokio::test]
async fn test_data_not_available_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|symbol, _| {
        Err(DataError::DataNotAvailable {
            symbol: symbol.to_string(),
            range: "1y".to_string(),
        })
    }));

    let report = engine(client.clone(), fast_config())
        .fetch_all(&requests(&["OLD"]), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(reason_of(&report, "OLD"), FailureReason::NoData);
    assert_eq!(client.calls("OLD").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_gate() {
    let dir = TempDir::new().unwrap();
    let client =
        Arc::new(ScriptedClient::new(always_ok).with_delay(Duration::from_millis(50)));
    let symbols: Vec<String> = (0..20).map(|i| format!("T{i}")).collect();
    let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();

    let report = engine(client.clone(), fast_config().with_max_concurrent(3))
        .fetch_all(&requests(&symbols), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(report.successful, 20);
    assert_eq!(client.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retrying_tickers_keep_their_slot() {
    const ATTEMPTS: u32 = 3;
    let dir = TempDir::new().unwrap();
    let mid_retry = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let client = {
        let mid_retry = Arc::clone(&mid_retry);
        let peak = Arc::clone(&peak);
        Arc::new(ScriptedClient::new(move |_, attempt| {
            if attempt == 1 {
                let now = mid_retry.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
            }
            if attempt == ATTEMPTS {
                mid_retry.fetch_sub(1, Ordering::SeqCst);
            }
            Err(network_error())
        }))
    };
    let symbols: Vec<String> = (0..8).map(|i| format!("F{i}")).collect();
    let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let config = EngineConfig::default()
        .with_max_concurrent(2)
        .with_retry_attempts(ATTEMPTS)
        .with_retry_base_delay(Duration::from_secs(1));

    let report = engine(client.clone(), config)
        .fetch_all(&requests(&symbols), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(report.failed, 8);
    for symbol in &symbols {
        assert_eq!(client.calls(symbol).len(), ATTEMPTS as usize);
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(mid_retry.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_calls_time_out_and_retry() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(always_ok).with_delay(Duration::from_secs(60)));
    let config = fast_config()
        .with_retry_attempts(2)
        .with_timeout(Duration::from_secs(5));

    let report = engine(client.clone(), config)
        .fetch_all(&requests(&["SLOW"]), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert!(report.failures[0].error.contains("timed out"));
    assert_eq!(client.calls("SLOW").len(), 2);
}

#[tokio::test]
async fn test_write_failure_is_recorded_without_refetch() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(always_ok));
    let writer = Arc::new(MemoryWriter::new().with_failure_for("MSFT"));

    let report = engine(client.clone(), fast_config())
        .fetch_all(&requests(&["AAPL", "MSFT"]), writer.clone(), dir.path())
        .await
        .unwrap();

    assert_eq!(report.successful_tickers, vec![Symbol::new("AAPL")]);
    assert_eq!(reason_of(&report, "MSFT"), FailureReason::Persist);
    assert_eq!(client.calls("MSFT").len(), 1);
    assert_eq!(writer.len().await, 1);
}

#[tokio::test]
async fn test_panicking_task_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|symbol, attempt| {
        if symbol.as_str() == "BOOM" {
            panic!("provider bug");
        }
        always_ok(symbol, attempt)
    }));

    let report = engine(client, fast_config())
        .fetch_all(&requests(&["BOOM", "AAPL"]), Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap();

    assert_eq!(report.successful, 1);
    assert_eq!(reason_of(&report, "BOOM"), FailureReason::Fetch);
}

#[tokio::test]
async fn test_rerun_writes_identical_files() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(always_ok));
    let engine = engine(client, fast_config());
    let writer: Arc<dyn TableWriter> = Arc::new(FileWriter::new(OutputFormat::Csv));
    let spec = DateSpec::range(
        "2023-01-01".parse().unwrap(),
        "2023-06-01".parse().unwrap(),
    )
    .unwrap();
    let requests = vec![FetchRequest::new("AAPL", spec)];
    let path = dir.path().join("AAPL_2023-01-01_2023-06-01_adj.csv");

    engine
        .fetch_all(&requests, Arc::clone(&writer), dir.path())
        .await
        .unwrap();
    let first = std::fs::read(&path).unwrap();

    engine
        .fetch_all(&requests, Arc::clone(&writer), dir.path())
        .await
        .unwrap();
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(read_table(&path).unwrap().height(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_requests_write_one_file() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(always_ok));
    let symbols = ["AAPL"; 16];

    let report = engine(client.clone(), fast_config())
        .fetch_all(&requests(&symbols), Arc::new(FileWriter::new(OutputFormat::Csv)), dir.path())
        .await
        .unwrap();

    assert_eq!(report.successful, 16, "{:?}", report.failures);
    assert_eq!(client.calls("AAPL").len(), 16);

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("AAPL_1y_adj.csv")]);
    assert_eq!(read_table(&dir.path().join("AAPL_1y_adj.csv")).unwrap().height(), 3);
}

#[tokio::test]
async fn test_output_dir_is_created() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    let client = Arc::new(ScriptedClient::new(always_ok));

    engine(client, fast_config())
        .fetch_all(&requests(&["SPY"]), Arc::new(FileWriter::new(OutputFormat::Json)), &nested)
        .await
        .unwrap();

    assert!(nested.join("SPY_1y_adj.json").exists());
}

#[tokio::test]
async fn test_empty_request_list_is_rejected() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(always_ok));

    let err = engine(client, fast_config())
        .fetch_all(&[], Arc::new(MemoryWriter::new()), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::InvalidParameter(_)));
}

#[test]
fn test_invalid_config_fails_fast() {
    let client = Arc::new(ScriptedClient::new(always_ok));
    for max_concurrent in [0, usize::MAX] {
        let config = EngineConfig::default().with_max_concurrent(max_concurrent);
        let err = ParallelFetchEngine::new(client.clone(), config).unwrap_err();
        assert!(matches!(err, DataError::InvalidConfiguration(_)));
    }
}
