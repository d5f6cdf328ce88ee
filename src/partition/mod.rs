//! Partition enumeration
//!
//! Several Visma.net resources cannot be filtered by an open-ended date
//! range; the API only accepts a discrete period (`YYYYMM`) or a financial
//! year. For those streams the extractor decomposes the configured date
//! range into an ordered, finite sequence of partitions and fully paginates
//! each one.
//!
//! Enumeration is a pure function of (start date, today): restartable, no
//! hidden state, oldest partition first.

use crate::error::Result;
use crate::types::StringMap;
use chrono::{Datelike, NaiveDate};

/// First financial year the API exposes
pub const FINANCIAL_YEAR_EPOCH: i32 = 2023;

/// Epoch date substituted when no start date is configured
pub const DEFAULT_EPOCH: (i32, u32, u32) = (2023, 1, 1);

/// Partition value key for monthly periods
pub const PERIOD_KEY: &str = "period";

/// Partition value key for financial years
pub const FINANCIAL_YEAR_KEY: &str = "financialYear";

/// One discrete, boundable unit of a logically continuous range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Unique identifier for this partition
    pub id: String,
    /// Values to inject into request parameters
    pub values: StringMap,
}

impl Partition {
    /// Create a new partition
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: StringMap::new(),
        }
    }

    /// Add a value to the partition
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Which partition sequence a stream iterates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSpec {
    /// `YYYYMM` periods from the start date's month through today's month
    MonthlyPeriods,
    /// Integer years from [`FINANCIAL_YEAR_EPOCH`] through the current year
    FinancialYears,
}

impl PartitionSpec {
    /// Enumerate the partition sequence for this spec.
    ///
    /// `start_date` is the configured replication start; when absent the
    /// fixed epoch default applies. `today` bounds the sequence.
    pub fn enumerate(self, start_date: Option<NaiveDate>, today: NaiveDate) -> Result<Vec<Partition>> {
        match self {
            Self::MonthlyPeriods => {
                let start = start_date.unwrap_or_else(default_epoch);
                Ok(monthly_periods(start, today))
            }
            Self::FinancialYears => Ok(financial_years(today)),
        }
    }
}

/// The fixed epoch date used when no start date is configured
pub fn default_epoch() -> NaiveDate {
    let (y, m, d) = DEFAULT_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d).expect("epoch constant is a valid date")
}

/// `YYYYMM` periods from the month of `start` through the month of `today`,
/// inclusive, oldest first. Month 12 rolls over to month 1 of the next year.
pub fn monthly_periods(start: NaiveDate, today: NaiveDate) -> Vec<Partition> {
    let mut periods = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    let (end_year, end_month) = (today.year(), today.month());

    while (year, month) <= (end_year, end_month) {
        let id = format!("{year:04}{month:02}");
        periods.push(Partition::new(&id).with_value(PERIOD_KEY, &id));

        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }

    periods
}

/// Every financial year from the epoch through the current calendar year
pub fn financial_years(today: NaiveDate) -> Vec<Partition> {
    (FINANCIAL_YEAR_EPOCH..=today.year())
        .map(|year| {
            let id = year.to_string();
            Partition::new(&id).with_value(FINANCIAL_YEAR_KEY, &id)
        })
        .collect()
}
