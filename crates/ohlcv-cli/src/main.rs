//! `ohlcv` - download daily OHLCV history for many tickers in parallel.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod data;
mod download;
mod logging;
mod lookup;
mod settings;
mod util;

use data::DataCommand;
use download::DownloadArgs;
use settings::Settings;

/// Default root of the per-country ticker lists.
const DEFAULT_TICKERS_DIR: &str = "data/tickers";

#[derive(Debug, Parser)]
#[command(
    name = "ohlcv",
    version,
    about = "Parallel daily OHLCV downloader and toolkit"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// JSON file with default option values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download history for a set of tickers
    Download(Box<DownloadArgs>),

    /// List available countries, or the tickers of one country
    ListTickers {
        /// Country code, e.g. us
        #[arg(long)]
        country: Option<String>,

        /// Root of the per-country ticker lists [default: data/tickers]
        #[arg(long)]
        tickers_dir: Option<PathBuf>,
    },

    /// Show company information for a ticker
    Info {
        /// Ticker symbol
        ticker: String,
    },

    /// Work with downloaded files
    Data {
        #[command(subcommand)]
        command: DataCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_optional(cli.config.as_deref())?;

    let level = cli
        .log_level
        .as_deref()
        .or(settings.log_level.as_deref())
        .unwrap_or("info");
    logging::init(level, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Download(args) => download::run(*args, &settings).await,
        Commands::ListTickers {
            country,
            tickers_dir,
        } => {
            let dir = tickers_dir
                .or_else(|| settings.tickers_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TICKERS_DIR));
            lookup::list_tickers(&dir, country.as_deref())
        }
        Commands::Info { ticker } => lookup::info(&ticker).await,
        Commands::Data { command } => data::run(command),
    }
}
