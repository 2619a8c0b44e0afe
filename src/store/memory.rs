//! In-memory Aggregate Store
//!
//! Process-local store used by unit tests and dry runs. A transaction holds
//! the store mutex for its whole lifetime and stages its writes; `commit`
//! publishes them, drop discards them.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::aggregate::{Aggregate, MonthAggregate, PayeeAggregate};
use crate::domain::{Address, EventId, EventPosition, MonthKey, PayrollEvent};

use super::{AggregateStore, Page, StoreError, StoreTransaction, StoredEvent};

#[derive(Debug, Default)]
struct MemoryState {
    payees: BTreeMap<Address, PayeeAggregate>,
    months: BTreeMap<MonthKey, MonthAggregate>,
    events: Vec<StoredEvent>,
    event_ids: HashSet<EventId>,
    /// Highest committed position
    checkpoint: Option<EventPosition>,
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail with `StoreError::Unavailable`
    /// until reset
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            payees: BTreeMap::new(),
            months: BTreeMap::new(),
            events: Vec::new(),
            fail_commits: self.fail_commits.clone(),
        }))
    }

    async fn get_payee(&self, id: &Address) -> Result<Option<PayeeAggregate>, StoreError> {
        Ok(self.state.lock().await.payees.get(id).cloned())
    }

    async fn list_payees(&self, page: Page) -> Result<Vec<PayeeAggregate>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .payees
            .values()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn get_month(&self, key: MonthKey) -> Result<Option<MonthAggregate>, StoreError> {
        Ok(self.state.lock().await.months.get(&key).cloned())
    }

    async fn list_months(
        &self,
        from: Option<MonthKey>,
        to: Option<MonthKey>,
    ) -> Result<Vec<MonthAggregate>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .months
            .values()
            .filter(|m| from.map_or(true, |from| m.key() >= from))
            .filter(|m| to.map_or(true, |to| m.key() <= to))
            .cloned()
            .collect())
    }

    async fn list_events(
        &self,
        kind: Option<&str>,
        page: Page,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| kind.map_or(true, |kind| e.kind == kind))
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn count_events(&self, kind: Option<&str>) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| kind.map_or(true, |kind| e.kind == kind))
            .count() as u64)
    }

    async fn last_checkpoint(&self) -> Result<Option<EventPosition>, StoreError> {
        Ok(self.state.lock().await.checkpoint)
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    payees: BTreeMap<Address, PayeeAggregate>,
    months: BTreeMap<MonthKey, MonthAggregate>,
    events: Vec<StoredEvent>,
    fail_commits: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn load_or_create_payee(&mut self, id: &Address) -> Result<PayeeAggregate, StoreError> {
        let existing = self.payees.get(id).or_else(|| self.guard.payees.get(id));
        Ok(existing
            .cloned()
            .unwrap_or_else(|| PayeeAggregate::new(id.clone())))
    }

    async fn save_payee(&mut self, payee: &PayeeAggregate) -> Result<(), StoreError> {
        let stored = PayeeAggregate::from_stored(
            payee.id().clone(),
            payee.total_paid(),
            payee.last_paid_at(),
        );
        self.payees.insert(payee.id().clone(), stored);
        Ok(())
    }

    async fn load_or_create_month(&mut self, key: MonthKey) -> Result<MonthAggregate, StoreError> {
        let existing = self.months.get(&key).or_else(|| self.guard.months.get(&key));
        Ok(existing.cloned().unwrap_or_else(|| MonthAggregate::new(key)))
    }

    async fn save_month(&mut self, month: &MonthAggregate) -> Result<(), StoreError> {
        let stored = MonthAggregate::from_stored(month.key(), month.total_cost());
        self.months.insert(month.key(), stored);
        Ok(())
    }

    async fn contains_event(&mut self, id: &EventId) -> Result<bool, StoreError> {
        Ok(self.guard.event_ids.contains(id) || self.events.iter().any(|e| &e.event_id == id))
    }

    async fn append_event(&mut self, event: &PayrollEvent) -> Result<(), StoreError> {
        self.events.push(StoredEvent::from_event(event, Utc::now())?);
        Ok(())
    }

    async fn checkpoint(&mut self) -> Result<Option<EventPosition>, StoreError> {
        let staged = self.events.iter().map(StoredEvent::position).max();
        Ok(staged.max(self.guard.checkpoint))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let MemoryTransaction {
            mut guard,
            payees,
            months,
            events,
            ..
        } = *self;

        guard.payees.extend(payees);
        guard.months.extend(months);
        for event in events {
            guard.checkpoint = guard.checkpoint.max(Some(event.position()));
            guard.event_ids.insert(event.event_id.clone());
            guard.events.push(event);
        }

        Ok(())
    }
}
