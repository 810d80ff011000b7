//! Parallel fetch engine: bounded fan-out, retries and aggregation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use ohlcv_core::{
    DataError, DownloadReport, FailureReason, FetchClient, FetchOutcome, FetchQuery, FetchRequest,
    OutcomeStatus, Result, TableWriter,
};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::gate::AdmissionGate;
use crate::normalize::{normalize, output_path};

/// Downloads many tickers concurrently with bounded parallelism and retry.
///
/// Each request runs as its own task. At most
/// [`EngineConfig::max_concurrent`] tasks are inside their fetch sequence at
/// any moment; a task keeps its slot across retries and backoff sleeps and
/// gives it up before writing. Per-ticker failures are recorded in the
/// report and never abort the run.
///
/// # Example
///
/// ```rust,ignore
/// use ohlcv::{EngineConfig, FileWriter, OutputFormat, ParallelFetchEngine, YahooClient};
/// use std::sync::Arc;
///
/// let engine = ParallelFetchEngine::new(Arc::new(YahooClient::new()), EngineConfig::default())?;
/// let writer = Arc::new(FileWriter::new(OutputFormat::Csv));
/// let report = engine.fetch_all(&requests, writer, "data/downloads".as_ref()).await?;
/// println!("{}/{} succeeded", report.successful, report.total);
/// ```
pub struct ParallelFetchEngine {
    client: Arc<dyn FetchClient>,
    config: EngineConfig,
}

impl std::fmt::Debug for ParallelFetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelFetchEngine")
            .field("client", &self.client.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ParallelFetchEngine {
    /// Create an engine, failing fast on an invalid configuration.
    pub fn new(client: Arc<dyn FetchClient>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        debug!(provider = client.name(), ?config, "Created fetch engine");
        Ok(Self { client, config })
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetches every request and writes each success under `output_dir`.
    ///
    /// Requests are neither deduplicated nor reordered; the report lists
    /// tickers in completion order and always satisfies
    /// `successful + failed == total`.
    ///
    /// Fails with [`DataError::InvalidParameter`] for an empty request list
    /// and with [`DataError::Io`] when `output_dir` cannot be created.
    #[instrument(skip_all, fields(provider = self.client.name(), total = requests.len()))]
    pub async fn fetch_all(
        &self,
        requests: &[FetchRequest],
        writer: Arc<dyn TableWriter>,
        output_dir: &Path,
    ) -> Result<DownloadReport> {
        if requests.is_empty() {
            return Err(DataError::InvalidParameter(
                "no tickers to download".to_string(),
            ));
        }

        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            DataError::Io(format!("creating {}: {e}", output_dir.display()))
        })?;

        let gate = AdmissionGate::new(self.config.max_concurrent);
        info!(
            max_concurrent = gate.capacity(),
            retry_attempts = self.config.retry_attempts,
            "Starting download"
        );

        let mut tasks = FuturesUnordered::new();
        for request in requests {
            let task = TickerTask {
                client: Arc::clone(&self.client),
                writer: Arc::clone(&writer),
                gate: gate.clone(),
                config: self.config.clone(),
                path: output_path(output_dir, request, writer.format()),
                request: request.clone(),
            };
            let symbol = request.symbol.clone();
            let handle = tokio::spawn(task.run());
            tasks.push(async move { (symbol, handle.await) });
        }

        let mut report = DownloadReport::new(requests.len());
        while let Some((symbol, joined)) = tasks.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                FetchOutcome::failure(
                    symbol,
                    FailureReason::Fetch,
                    DataError::Other(format!("download task failed: {e}")),
                    0,
                )
            });

            match &outcome.status {
                OutcomeStatus::Success(table) => debug!(
                    symbol = %outcome.symbol,
                    rows = table.height(),
                    attempts = outcome.attempts,
                    "Ticker done"
                ),
                OutcomeStatus::Failure(reason, error) => warn!(
                    symbol = %outcome.symbol,
                    %reason,
                    error = %error,
                    attempts = outcome.attempts,
                    "Ticker failed"
                ),
            }
            report.record(&outcome);
        }

        info!(
            successful = report.successful,
            failed = report.failed,
            "Download finished"
        );
        Ok(report)
    }
}

/// Everything one spawned task needs, owned.
struct TickerTask {
    client: Arc<dyn FetchClient>,
    writer: Arc<dyn TableWriter>,
    gate: AdmissionGate,
    config: EngineConfig,
    request: FetchRequest,
    path: PathBuf,
}

impl TickerTask {
    async fn run(self) -> FetchOutcome {
        let outcome = match self.gate.admit().await {
            Ok(_permit) => self.fetch_with_retry().await,
            Err(e) => {
                FetchOutcome::failure(self.request.symbol.clone(), FailureReason::Fetch, e, 0)
            }
        };
        self.persist(outcome).await
    }

    /// Attempts the fetch up to `retry_attempts` times.
    async fn fetch_with_retry(&self) -> FetchOutcome {
        let symbol = &self.request.symbol;
        let query = FetchQuery::from_request(&self.request, self.config.timeout);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(ticker = %self.request.label(), attempt, "Fetching");

            let error = match self.fetch_once(&query).await {
                Ok(table) if table.height() == 0 => {
                    return FetchOutcome::failure(
                        symbol.clone(),
                        FailureReason::NoData,
                        no_data(&self.request),
                        attempt,
                    );
                }
                Ok(table) => return FetchOutcome::success(symbol.clone(), table, attempt),
                Err(e @ DataError::DataNotAvailable { .. }) => {
                    return FetchOutcome::failure(symbol.clone(), FailureReason::NoData, e, attempt);
                }
                Err(e) if !e.is_retryable() => {
                    return FetchOutcome::failure(symbol.clone(), FailureReason::Fetch, e, attempt);
                }
                Err(e) => e,
            };

            if attempt >= self.config.retry_attempts {
                return FetchOutcome::failure(symbol.clone(), FailureReason::Fetch, error, attempt);
            }

            let delay = self.config.backoff_delay(attempt - 1);
            warn!(symbol = %symbol, attempt, error = %error, ?delay, "Fetch failed, retrying");
            sleep(delay).await;
        }
    }

    /// One provider call followed by normalization.
    async fn fetch_once(&self, query: &FetchQuery) -> Result<polars::prelude::DataFrame> {
        let raw = match timeout(self.config.timeout, self.client.fetch(query)).await {
            Ok(result) => result?,
            Err(_) => return Err(DataError::Timeout(self.config.timeout)),
        };

        if raw.height() == 0 {
            return Ok(raw);
        }
        normalize(&raw, &self.request.symbol)
    }

    /// Writes a successful table; a write error turns the outcome into a failure.
    async fn persist(&self, outcome: FetchOutcome) -> FetchOutcome {
        let OutcomeStatus::Success(table) = &outcome.status else {
            return outcome;
        };

        let written = self.writer.write(&outcome.symbol, table, &self.path).await;
        match written {
            Ok(()) => {
                debug!(symbol = %outcome.symbol, path = %self.path.display(), "Saved");
                outcome
            }
            Err(e) => FetchOutcome::failure(
                outcome.symbol,
                FailureReason::Persist,
                e,
                outcome.attempts,
            ),
        }
    }
}

fn no_data(request: &FetchRequest) -> DataError {
    DataError::DataNotAvailable {
        symbol: request.symbol.to_string(),
        range: request.spec.file_component(),
    }
}
