//! Payee Aggregate
//!
//! Cumulative payroll paid to one address.

use serde::{Deserialize, Serialize};

use crate::domain::{Address, AmountError, TokenAmount};

use super::Aggregate;

/// Payee Aggregate
///
/// `total_paid` is the exact sum of every claim processed for this payee.
/// `last_paid_at` is the block timestamp of the latest processed claim and is
/// `None` only on a freshly created, never-saved record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeAggregate {
    id: Address,
    total_paid: TokenAmount,
    last_paid_at: Option<u64>,
    #[serde(skip)]
    is_new: bool,
}

impl PayeeAggregate {
    /// Zero-initialized payee, not yet persisted
    pub fn new(id: Address) -> Self {
        Self {
            id,
            total_paid: TokenAmount::ZERO,
            last_paid_at: None,
            is_new: true,
        }
    }

    /// Rebuild a payee from stored state
    pub fn from_stored(id: Address, total_paid: TokenAmount, last_paid_at: Option<u64>) -> Self {
        Self {
            id,
            total_paid,
            last_paid_at,
            is_new: false,
        }
    }

    /// Add a claim to the running total and advance `last_paid_at`.
    ///
    /// On overflow the aggregate is left unchanged.
    pub fn record_claim(&mut self, amount: TokenAmount, paid_at: u64) -> Result<(), AmountError> {
        let total_paid = self.total_paid.checked_add(amount)?;
        self.total_paid = total_paid;
        self.last_paid_at = Some(paid_at);
        Ok(())
    }

    pub fn total_paid(&self) -> TokenAmount {
        self.total_paid
    }

    pub fn last_paid_at(&self) -> Option<u64> {
        self.last_paid_at
    }
}

impl Aggregate for PayeeAggregate {
    type Id = Address;

    fn aggregate_type() -> &'static str {
        "Payee"
    }

    fn id(&self) -> &Address {
        &self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }
}
