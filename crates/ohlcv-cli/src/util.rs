//! Formatting helpers for console output.

use std::time::Duration;

/// Assumed wall time of one fetch, used for the up-front estimate.
const AVG_SECONDS_PER_TICKER: f64 = 0.5;

/// Rough duration of a run of `tickers` requests with `max_concurrent` slots.
pub(crate) fn estimate_download_time(tickers: usize, max_concurrent: usize) -> Duration {
    let batches = if tickers <= max_concurrent {
        1.0
    } else {
        tickers as f64 / max_concurrent.max(1) as f64
    };
    Duration::from_secs_f64(batches * AVG_SECONDS_PER_TICKER)
}

/// `12.5 seconds`, `3.2 minutes` or `1.5 hours`.
pub(crate) fn format_time(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    if seconds < 60.0 {
        format!("{seconds:.1} seconds")
    } else if seconds < 3600.0 {
        format!("{:.1} minutes", seconds / 60.0)
    } else {
        format!("{:.1} hours", seconds / 3600.0)
    }
}

/// Byte count with a binary unit, e.g. `1.50 KB`.
pub(crate) fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

/// Whole number with comma thousands separators, e.g. `2,500,000`.
pub(crate) fn format_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0.0 && digits != "0" {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate() {
        assert_eq!(estimate_download_time(10, 50), Duration::from_millis(500));
        assert_eq!(estimate_download_time(200, 50), Duration::from_secs(2));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::from_secs_f64(12.5)), "12.5 seconds");
        assert_eq!(format_time(Duration::from_secs(192)), "3.2 minutes");
        assert_eq!(format_time(Duration::from_secs(5400)), "1.5 hours");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(2_500_000_000.0), "2,500,000,000");
        assert_eq!(format_thousands(-1234.4), "-1,234");
    }
}
