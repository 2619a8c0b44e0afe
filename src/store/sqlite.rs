//! SQLite Aggregate Store
//!
//! Embedded store backed by `sqlx`. Amounts are kept as decimal TEXT because
//! SQLite integers are 64-bit and totals are 128-bit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

use crate::aggregate::{Aggregate, MonthAggregate, PayeeAggregate};
use crate::domain::{Address, EventId, EventPosition, MonthKey, PayrollEvent, TokenAmount};

use super::{AggregateStore, Page, StoreError, StoreTransaction, StoredEvent};

type EventRow = (String, String, i64, i64, i64, String, String, String);

/// Aggregate store on a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SqliteStore with a migrated database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn to_i64(field: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::ValueOutOfRange {
        field,
        value: value.to_string(),
    })
}

fn from_i64<T: TryFrom<i64>>(table: &'static str, id: &str, value: i64) -> Result<T, StoreError> {
    T::try_from(value).map_err(|_| {
        StoreError::corrupt(table, id, format!("negative or oversized value {}", value))
    })
}

fn parse_amount(table: &'static str, id: &str, value: &str) -> Result<TokenAmount, StoreError> {
    TokenAmount::from_str(value).map_err(|e| StoreError::corrupt(table, id, e))
}

fn payee_from_row(
    id: String,
    total_paid: String,
    last_paid_at: Option<i64>,
) -> Result<PayeeAggregate, StoreError> {
    let total_paid = parse_amount("payees", &id, &total_paid)?;
    let last_paid_at = last_paid_at
        .map(|ts| from_i64::<u64>("payees", &id, ts))
        .transpose()?;
    let address = Address::parse(&id).map_err(|e| StoreError::corrupt("payees", &id, e))?;
    Ok(PayeeAggregate::from_stored(address, total_paid, last_paid_at))
}

fn month_from_row(id: i64, total_cost: String) -> Result<MonthAggregate, StoreError> {
    let key = MonthKey::try_from(id).map_err(|e| StoreError::corrupt("monthly_payrolls", id, e))?;
    let total_cost = parse_amount("monthly_payrolls", &id.to_string(), &total_cost)?;
    Ok(MonthAggregate::from_stored(key, total_cost))
}

fn event_from_row(row: EventRow) -> Result<StoredEvent, StoreError> {
    let (event_id, kind, block_number, log_index, block_timestamp, tx_hash, payload, ingested_at) =
        row;

    let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
        .map_err(|e| StoreError::corrupt("payroll_events", &event_id, e))?
        .with_timezone(&Utc);

    Ok(StoredEvent {
        block_number: from_i64("payroll_events", &event_id, block_number)?,
        log_index: from_i64("payroll_events", &event_id, log_index)?,
        block_timestamp: from_i64("payroll_events", &event_id, block_timestamp)?,
        payload: serde_json::from_str(&payload)?,
        event_id: EventId::from_stored(event_id),
        kind,
        tx_hash,
        ingested_at,
    })
}

fn position_from_row(row: Option<(i64, i64)>) -> Result<Option<EventPosition>, StoreError> {
    row.map(|(block_number, log_index)| {
        Ok(EventPosition {
            block_number: from_i64("payroll_events", "checkpoint", block_number)?,
            log_index: from_i64("payroll_events", "checkpoint", log_index)?,
        })
    })
    .transpose()
}

const CHECKPOINT_QUERY: &str = r#"
    SELECT block_number, log_index
    FROM payroll_events
    ORDER BY block_number DESC, log_index DESC
    LIMIT 1
"#;

#[async_trait]
impl AggregateStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn get_payee(&self, id: &Address) -> Result<Option<PayeeAggregate>, StoreError> {
        let row: Option<(String, String, Option<i64>)> = sqlx::query_as(
            "SELECT id, total_paid, last_paid_at FROM payees WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, total, last)| payee_from_row(id, total, last))
            .transpose()
    }

    async fn list_payees(&self, page: Page) -> Result<Vec<PayeeAggregate>, StoreError> {
        let rows: Vec<(String, String, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT id, total_paid, last_paid_at
            FROM payees
            ORDER BY id ASC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, total, last)| payee_from_row(id, total, last))
            .collect()
    }

    async fn get_month(&self, key: MonthKey) -> Result<Option<MonthAggregate>, StoreError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, total_cost FROM monthly_payrolls WHERE id = ?1")
                .bind(to_i64("month_key", key.value())?)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, total)| month_from_row(id, total)).transpose()
    }

    async fn list_months(
        &self,
        from: Option<MonthKey>,
        to: Option<MonthKey>,
    ) -> Result<Vec<MonthAggregate>, StoreError> {
        let from = from.map(|k| to_i64("from", k.value())).transpose()?.unwrap_or(0);
        let to = to.map(|k| to_i64("to", k.value())).transpose()?.unwrap_or(i64::MAX);

        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT id, total_cost
            FROM monthly_payrolls
            WHERE id >= ?1 AND id <= ?2
            ORDER BY id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, total)| month_from_row(id, total))
            .collect()
    }

    async fn list_events(
        &self,
        kind: Option<&str>,
        page: Page,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT event_id, kind, block_number, log_index, block_timestamp, tx_hash, payload, ingested_at
            FROM payroll_events
            WHERE ?1 IS NULL OR kind = ?1
            ORDER BY block_number ASC, log_index ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(kind)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(event_from_row).collect()
    }

    async fn count_events(&self, kind: Option<&str>) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payroll_events WHERE ?1 IS NULL OR kind = ?1",
        )
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        from_i64("payroll_events", "count", count)
    }

    async fn last_checkpoint(&self) -> Result<Option<EventPosition>, StoreError> {
        let row: Option<(i64, i64)> = sqlx::query_as(CHECKPOINT_QUERY)
            .fetch_optional(&self.pool)
            .await?;

        position_from_row(row)
    }
}

/// Wraps a sqlx transaction; sqlx rolls back on drop
struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn load_or_create_payee(&mut self, id: &Address) -> Result<PayeeAggregate, StoreError> {
        let row: Option<(String, String, Option<i64>)> = sqlx::query_as(
            "SELECT id, total_paid, last_paid_at FROM payees WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some((id, total, last)) => payee_from_row(id, total, last),
            None => Ok(PayeeAggregate::new(id.clone())),
        }
    }

    async fn save_payee(&mut self, payee: &PayeeAggregate) -> Result<(), StoreError> {
        let last_paid_at = payee
            .last_paid_at()
            .map(|ts| to_i64("last_paid_at", ts))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO payees (id, total_paid, last_paid_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (id) DO UPDATE SET
                total_paid = excluded.total_paid,
                last_paid_at = excluded.last_paid_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(payee.id().as_str())
        .bind(payee.total_paid().to_string())
        .bind(last_paid_at)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn load_or_create_month(&mut self, key: MonthKey) -> Result<MonthAggregate, StoreError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, total_cost FROM monthly_payrolls WHERE id = ?1")
                .bind(to_i64("month_key", key.value())?)
                .fetch_optional(&mut *self.tx)
                .await?;

        match row {
            Some((id, total)) => month_from_row(id, total),
            None => Ok(MonthAggregate::new(key)),
        }
    }

    async fn save_month(&mut self, month: &MonthAggregate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO monthly_payrolls (id, total_cost, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                total_cost = excluded.total_cost,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(to_i64("month_key", month.key().value())?)
        .bind(month.total_cost().to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn contains_event(&mut self, id: &EventId) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM payroll_events WHERE event_id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(found.is_some())
    }

    async fn append_event(&mut self, event: &PayrollEvent) -> Result<(), StoreError> {
        let stored = StoredEvent::from_event(event, Utc::now())?;

        sqlx::query(
            r#"
            INSERT INTO payroll_events (
                event_id, kind, block_number, log_index,
                block_timestamp, tx_hash, payload, ingested_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(stored.event_id.as_str())
        .bind(&stored.kind)
        .bind(to_i64("block_number", stored.block_number)?)
        .bind(i64::from(stored.log_index))
        .bind(to_i64("block_timestamp", stored.block_timestamp)?)
        .bind(&stored.tx_hash)
        .bind(serde_json::to_string(&stored.payload)?)
        .bind(stored.ingested_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn checkpoint(&mut self) -> Result<Option<EventPosition>, StoreError> {
        let row: Option<(i64, i64)> = sqlx::query_as(CHECKPOINT_QUERY)
            .fetch_optional(&mut *self.tx)
            .await?;

        position_from_row(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
