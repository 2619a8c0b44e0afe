//! Month bucketing
//!
//! Maps a block timestamp to the month bucket its claim is totalled under.
//!
//! The mapping is a fixed-epoch approximation, not the Gregorian calendar:
//! every year is 365 days and every month 30 days, counted from 1970.
//! `key = (ts / YEAR + 1970) * 100 + (ts % YEAR) / MONTH + 1`.
//! Month numbers therefore run 1..=13; the last five days of each year land
//! in month 13. Keys are comparable only with keys from this same function.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Seconds in the approximated year (365 days).
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Seconds in the approximated month (30 days).
pub const SECONDS_PER_MONTH: u64 = 2_592_000;

const EPOCH_YEAR: u64 = 1970;

/// Keys are stored as signed 64-bit integers
const MAX_KEY: u64 = i64::MAX as u64;

/// Bucket key in `YYYYMM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey(u64);

impl MonthKey {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn year(&self) -> u64 {
        self.0 / 100
    }

    pub fn month(&self) -> u64 {
        self.0 % 100
    }
}

/// Compute the month bucket for a timestamp (seconds since the Unix epoch).
pub fn bucket_key(timestamp: u64) -> MonthKey {
    let year = timestamp / SECONDS_PER_YEAR + EPOCH_YEAR;
    let month = (timestamp % SECONDS_PER_YEAR) / SECONDS_PER_MONTH + 1;
    MonthKey(year * 100 + month)
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MonthKey {
    type Err = DomainError;

    /// Parse a `YYYYMM` key. Months 1..=13 are valid.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|_| DomainError::InvalidMonthKey(s.to_string()))?;

        let month = value % 100;
        if value > MAX_KEY || value / 100 < EPOCH_YEAR || month == 0 || month > 13 {
            return Err(DomainError::InvalidMonthKey(s.to_string()));
        }

        Ok(MonthKey(value))
    }
}

impl TryFrom<i64> for MonthKey {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map_err(|_| DomainError::InvalidMonthKey(value.to_string()))
            .map(MonthKey)
    }
}
