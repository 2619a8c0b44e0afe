//! Aggregation Engine
//!
//! Folds payroll claims into the payee and month projections.
//!
//! The engine does not deduplicate: applying the same claim twice counts it
//! twice. Callers must deliver each claim once, in chain order (see
//! [`crate::ingest::Ingestor`]).

mod error;

use serde::Serialize;
use std::sync::Arc;

use crate::aggregate::Aggregate;
use crate::domain::{bucket_key, Address, AmountError, ClaimEvent, MonthKey, TokenAmount};
use crate::store::{AggregateStore, StoreTransaction};

pub use error::IndexerError;

/// Totals after a claim was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
    pub payee: Address,
    pub month: MonthKey,
    pub total_paid: TokenAmount,
    pub month_total: TokenAmount,
}

/// Aggregation engine over an injected store
#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn AggregateStore>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AggregateStore> {
        &self.store
    }

    /// Apply one claim in its own transaction.
    ///
    /// Either both aggregates are committed or neither is.
    pub async fn handle_claim(&self, event: &ClaimEvent) -> Result<ClaimOutcome, IndexerError> {
        let mut tx = self.store.begin().await?;
        let outcome = self.apply_claim(tx.as_mut(), event).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Apply one claim inside a caller-owned transaction.
    ///
    /// Nothing is visible until the caller commits; on error the caller must
    /// drop the transaction.
    pub async fn apply_claim(
        &self,
        tx: &mut dyn StoreTransaction,
        event: &ClaimEvent,
    ) -> Result<ClaimOutcome, IndexerError> {
        let mut payee = tx.load_or_create_payee(&event.payee).await?;
        let payee_created = payee.is_new();
        payee
            .record_claim(event.amount, event.timestamp)
            .map_err(|source| overflow(&payee, source))?;
        tx.save_payee(&payee).await?;

        let key = bucket_key(event.timestamp);
        let mut month = tx.load_or_create_month(key).await?;
        let month_created = month.is_new();
        month
            .record_cost(event.amount)
            .map_err(|source| overflow(&month, source))?;
        tx.save_month(&month).await?;

        tracing::debug!(
            event_id = %event.event_id,
            payee = %event.payee,
            amount = %event.amount,
            month = %key,
            payee_created,
            month_created,
            "Claim applied"
        );

        Ok(ClaimOutcome {
            payee: event.payee.clone(),
            month: key,
            total_paid: payee.total_paid(),
            month_total: month.total_cost(),
        })
    }
}

fn overflow<A: Aggregate>(aggregate: &A, source: AmountError) -> IndexerError {
    tracing::error!(
        aggregate_type = A::aggregate_type(),
        id = %aggregate.id(),
        error = %source,
        "Aggregate total overflow"
    );
    IndexerError::Overflow {
        aggregate_type: A::aggregate_type(),
        id: aggregate.id().to_string(),
        source,
    }
}
