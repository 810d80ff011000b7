//! Bar frequency and named period definitions.
//!
//! This module defines [`Frequency`] for the granularity of resampled series
//! and [`Period`] for relative date-range shorthands such as `1y` or `max`.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Granularity of a bar series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Daily bars.
    #[default]
    Daily,
    /// Weekly bars.
    Weekly,
    /// Monthly bars.
    Monthly,
}

impl Frequency {
    /// Returns the polars duration string used to truncate dates to this frequency.
    #[must_use]
    pub const fn truncate_every(&self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Weekly => "1w",
            Self::Monthly => "1mo",
        }
    }
}

impl FromStr for Frequency {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "D" | "1D" | "DAILY" => Ok(Self::Daily),
            "W" | "1W" | "WEEKLY" => Ok(Self::Weekly),
            "M" | "1M" | "1MO" | "MONTHLY" => Ok(Self::Monthly),
            other => Err(DataError::InvalidParameter(format!(
                "unknown frequency '{other}', expected D, W or M"
            ))),
        }
    }
}

/// A relative date-range shorthand understood by the data provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    /// One trading day.
    #[serde(rename = "1d")]
    OneDay,
    /// Five trading days.
    #[serde(rename = "5d")]
    FiveDays,
    /// One month.
    #[serde(rename = "1mo")]
    OneMonth,
    /// Three months.
    #[serde(rename = "3mo")]
    ThreeMonths,
    /// Six months.
    #[serde(rename = "6mo")]
    SixMonths,
    /// One year.
    #[serde(rename = "1y")]
    OneYear,
    /// Two years.
    #[serde(rename = "2y")]
    TwoYears,
    /// Five years.
    #[serde(rename = "5y")]
    FiveYears,
    /// Ten years.
    #[serde(rename = "10y")]
    TenYears,
    /// Since the first day of the current year.
    #[serde(rename = "ytd")]
    YearToDate,
    /// The full available history.
    #[serde(rename = "max")]
    Max,
}

impl Period {
    /// All supported periods, shortest first.
    pub const ALL: [Self; 11] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
        Self::FiveYears,
        Self::TenYears,
        Self::YearToDate,
        Self::Max,
    ];

    /// Returns the provider token for this period (also used in file names).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }

    /// Resolves the period to a calendar start date relative to `today`.
    ///
    /// Returns `None` for [`Period::Max`], which has no fixed start.
    #[must_use]
    pub fn start_from(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::OneDay => today.pred_opt(),
            Self::FiveDays => today.checked_sub_days(chrono::Days::new(5)),
            Self::OneMonth => today.checked_sub_months(Months::new(1)),
            Self::ThreeMonths => today.checked_sub_months(Months::new(3)),
            Self::SixMonths => today.checked_sub_months(Months::new(6)),
            Self::OneYear => today.checked_sub_months(Months::new(12)),
            Self::TwoYears => today.checked_sub_months(Months::new(24)),
            Self::FiveYears => today.checked_sub_months(Months::new(60)),
            Self::TenYears => today.checked_sub_months(Months::new(120)),
            Self::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            Self::Max => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == token)
            .ok_or_else(|| {
                DataError::InvalidParameter(format!(
                    "unknown period '{s}', expected one of 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max"
                ))
            })
    }
}
