//! Aggregate Store module
//!
//! Persistence layer for the payee and month projections and the raw event log.
//!
//! All writes go through a [`StoreTransaction`]: nothing becomes visible until
//! `commit`, and dropping a transaction discards its writes. Transactions are
//! serialized, so a load always observes every previously committed save.

mod error;
mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{MonthAggregate, PayeeAggregate};
use crate::domain::{Address, EventId, EventPosition, MonthKey, PayrollEvent};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Maximum page size for list queries
pub const MAX_PAGE_SIZE: u32 = 500;

/// Entry of the raw event log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub kind: String,
    pub block_number: u64,
    pub log_index: u32,
    pub block_timestamp: u64,
    pub tx_hash: String,
    pub payload: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Build the log entry for an event about to be appended
    pub fn from_event(
        event: &PayrollEvent,
        ingested_at: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let mut payload = serde_json::to_value(&event.kind)?;
        if let Some(map) = payload.as_object_mut() {
            map.remove("kind");
        }

        Ok(Self {
            event_id: event.event_id().clone(),
            kind: event.kind_name().to_string(),
            block_number: event.meta.block_number,
            log_index: event.meta.log_index,
            block_timestamp: event.meta.block_timestamp,
            tx_hash: event.meta.tx_hash.clone(),
            payload,
            ingested_at,
        })
    }

    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }
}

/// Offset pagination for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(50, 0)
    }
}

/// One unit of work against the store.
///
/// Dropping the transaction without calling [`StoreTransaction::commit`]
/// rolls back every write made through it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Existing payee or a zero-initialized one; creation is not persisted
    /// until `save_payee`
    async fn load_or_create_payee(&mut self, id: &Address) -> Result<PayeeAggregate, StoreError>;

    /// Upsert a payee by identity, overwriting all mutable fields
    async fn save_payee(&mut self, payee: &PayeeAggregate) -> Result<(), StoreError>;

    async fn load_or_create_month(&mut self, key: MonthKey) -> Result<MonthAggregate, StoreError>;

    async fn save_month(&mut self, month: &MonthAggregate) -> Result<(), StoreError>;

    /// Whether the event log already holds this id
    async fn contains_event(&mut self, id: &EventId) -> Result<bool, StoreError>;

    /// Append an event to the immutable event log
    async fn append_event(&mut self, event: &PayrollEvent) -> Result<(), StoreError>;

    /// Position of the last logged event
    async fn checkpoint(&mut self) -> Result<Option<EventPosition>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Key-value projection storage
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn get_payee(&self, id: &Address) -> Result<Option<PayeeAggregate>, StoreError>;

    /// Payees ordered by address
    async fn list_payees(&self, page: Page) -> Result<Vec<PayeeAggregate>, StoreError>;

    async fn get_month(&self, key: MonthKey) -> Result<Option<MonthAggregate>, StoreError>;

    /// Months in key order, bounds inclusive
    async fn list_months(
        &self,
        from: Option<MonthKey>,
        to: Option<MonthKey>,
    ) -> Result<Vec<MonthAggregate>, StoreError>;

    /// Event log in chain order, optionally restricted to one kind
    async fn list_events(&self, kind: Option<&str>, page: Page)
        -> Result<Vec<StoredEvent>, StoreError>;

    async fn count_events(&self, kind: Option<&str>) -> Result<u64, StoreError>;

    /// Position of the last committed event
    async fn last_checkpoint(&self) -> Result<Option<EventPosition>, StoreError>;
}
