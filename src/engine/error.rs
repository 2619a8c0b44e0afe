//! Indexer Errors
//!
//! Errors surfaced to the caller of the aggregation engine and the ingestor.

use crate::domain::{AmountError, DomainError, EventPosition};
use crate::store::StoreError;

/// Errors that abort processing of one event
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Event rejected before any store access
    #[error("Malformed event: {0}")]
    Malformed(#[from] DomainError),

    /// An aggregate total would exceed 128 bits
    #[error("Amount overflow on {aggregate_type} {id}: {source}")]
    Overflow {
        aggregate_type: &'static str,
        id: String,
        #[source]
        source: AmountError,
    },

    /// Event position is not after the committed checkpoint
    #[error("Out-of-order event {event_id} at {position}, checkpoint is {checkpoint}")]
    OutOfOrder {
        event_id: String,
        position: EventPosition,
        checkpoint: EventPosition,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IndexerError {
    /// Retrying the same event from the same position may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexerError::Store(e) if e.is_retryable())
    }

    /// Processing of the stream must halt
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IndexerError::Overflow { .. } | IndexerError::OutOfOrder { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let malformed = IndexerError::from(DomainError::MissingField("employee"));
        assert!(!malformed.is_fatal());
        assert!(!malformed.is_retryable());

        let overflow = IndexerError::Overflow {
            aggregate_type: "Payee",
            id: "0xaa".to_string(),
            source: AmountError::Overflow { current: u128::MAX, delta: 1 },
        };
        assert!(overflow.is_fatal());
        assert!(overflow.to_string().contains("Payee 0xaa"));

        let store = IndexerError::from(StoreError::Unavailable("locked".to_string()));
        assert!(store.is_retryable());
        assert!(!store.is_fatal());
    }
}
