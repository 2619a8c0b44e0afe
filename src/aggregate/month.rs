//! Month Aggregate
//!
//! Total payroll cost of one month bucket.

use serde::{Deserialize, Serialize};

use crate::domain::{AmountError, MonthKey, TokenAmount};

use super::Aggregate;

/// Month Aggregate
///
/// `total_cost` is the exact sum of every claim whose block timestamp
/// buckets to `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthAggregate {
    key: MonthKey,
    total_cost: TokenAmount,
    #[serde(skip)]
    is_new: bool,
}

impl MonthAggregate {
    pub fn new(key: MonthKey) -> Self {
        Self {
            key,
            total_cost: TokenAmount::ZERO,
            is_new: true,
        }
    }

    pub fn from_stored(key: MonthKey, total_cost: TokenAmount) -> Self {
        Self {
            key,
            total_cost,
            is_new: false,
        }
    }

    /// Add a claim amount to this month's cost
    pub fn record_cost(&mut self, amount: TokenAmount) -> Result<(), AmountError> {
        self.total_cost = self.total_cost.checked_add(amount)?;
        Ok(())
    }

    pub fn key(&self) -> MonthKey {
        self.key
    }

    pub fn total_cost(&self) -> TokenAmount {
        self.total_cost
    }
}

impl Aggregate for MonthAggregate {
    type Id = MonthKey;

    fn aggregate_type() -> &'static str {
        "Month"
    }

    fn id(&self) -> &MonthKey {
        &self.key
    }

    fn is_new(&self) -> bool {
        self.is_new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bucket_key;

    #[test]
    fn test_record_cost() {
        let mut month = MonthAggregate::new(bucket_key(0));
        month.record_cost(TokenAmount::new(200)).unwrap();
        month.record_cost(TokenAmount::new(200)).unwrap();

        assert_eq!(month.total_cost(), TokenAmount::new(400));
        assert_eq!(month.key().value(), 197001);
        assert!(month.is_new());
    }

    #[test]
    fn test_overflow_rejected() {
        let mut month = MonthAggregate::from_stored(bucket_key(0), TokenAmount::new(u128::MAX));
        assert!(month.record_cost(TokenAmount::new(1)).is_err());
        assert_eq!(month.total_cost(), TokenAmount::new(u128::MAX));
    }
}
