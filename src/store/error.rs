//! Store Errors
//!
//! Error types for aggregate store operations.

/// Errors that can occur in the aggregate store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded
    #[error("Corrupt {table} record {id}: {reason}")]
    CorruptRecord {
        table: &'static str,
        id: String,
        reason: String,
    },

    /// A value does not fit the storage column
    #[error("Value out of range for {field}: {value}")]
    ValueOutOfRange { field: &'static str, value: String },

    /// Store temporarily unable to serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, id: impl ToString, reason: impl ToString) -> Self {
        Self::CorruptRecord {
            table,
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Check if retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Database(_) | StoreError::Unavailable(_))
    }
}
