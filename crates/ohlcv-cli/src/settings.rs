//! Optional JSON settings file.
//!
//! Values in the file replace the built-in defaults; flags given on the
//! command line still win.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ohlcv::{OutputFormat, Period};
use serde::Deserialize;
use tracing::debug;

/// Defaults read from `--config`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub(crate) log_level: Option<String>,
    pub(crate) tickers_dir: Option<PathBuf>,
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) format: Option<OutputFormat>,
    pub(crate) days: Option<u32>,
    pub(crate) period: Option<Period>,
    pub(crate) raw: Option<bool>,
    pub(crate) concurrency: Option<usize>,
    pub(crate) retry: Option<u32>,
    pub(crate) retry_delay: Option<f64>,
    pub(crate) timeout: Option<f64>,
}

impl Settings {
    /// Reads settings from a JSON file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        debug!(path = %path.display(), ?settings, "Loaded settings");
        Ok(settings)
    }

    /// Settings from `path`, or the empty set when no file was given.
    pub(crate) fn load_optional(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"format": "parquet", "concurrency": 10, "retry_delay": 0.5, "period": "5y"}"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.format, Some(OutputFormat::Parquet));
        assert_eq!(settings.concurrency, Some(10));
        assert_eq!(settings.retry_delay, Some(0.5));
        assert_eq!(settings.period, Some(Period::FiveYears));
        assert_eq!(settings.retry, None);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"concurency": 10}"#).unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_no_config_is_empty() {
        assert_eq!(Settings::load_optional(None).unwrap(), Settings::default());
    }
}
