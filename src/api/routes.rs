//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::{Aggregate, MonthAggregate, PayeeAggregate};
use crate::domain::{Address, DomainError, EventPosition, EventRecord, MonthKey, TokenAmount};
use crate::error::AppError;
use crate::ingest::BatchReport;
use crate::store::{Page, StoredEvent};

use super::middleware::ingest_auth_middleware;
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

impl From<&PageQuery> for Page {
    fn from(query: &PageQuery) -> Self {
        Page::new(query.limit, query.offset)
    }
}

#[derive(Debug, Deserialize)]
pub struct MonthRangeQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Serialize)]
pub struct PayeeResponse {
    pub address: Address,
    pub total_paid: TokenAmount,
    pub last_paid_at: Option<u64>,
}

impl From<PayeeAggregate> for PayeeResponse {
    fn from(payee: PayeeAggregate) -> Self {
        Self {
            address: payee.id().clone(),
            total_paid: payee.total_paid(),
            last_paid_at: payee.last_paid_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MonthResponse {
    pub key: MonthKey,
    pub year: u64,
    pub month: u64,
    pub total_cost: TokenAmount,
}

impl From<MonthAggregate> for MonthResponse {
    fn from(month: MonthAggregate) -> Self {
        let key = month.key();
        Self {
            key,
            year: key.year(),
            month: key.month(),
            total_cost: month.total_cost(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventsListResponse {
    pub events: Vec<StoredEvent>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct CheckpointResponse {
    pub checkpoint: Option<EventPosition>,
}

/// Raw records are kept as JSON so one bad element does not reject the batch
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub events: Vec<Value>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/payees", get(list_payees))
        .route("/payees/:address", get(get_payee))
        .route("/months", get(list_months))
        .route("/months/:key", get(get_month))
        .route("/events", get(list_events))
        .route(
            "/events",
            post(ingest_events).route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                ingest_auth_middleware,
            )),
        )
        .route("/checkpoint", get(get_checkpoint))
}

// =========================================================================
// Payees
// =========================================================================

async fn list_payees(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<PayeeResponse>>, AppError> {
    let payees = state.store.list_payees(Page::from(&query)).await?;
    Ok(Json(payees.into_iter().map(PayeeResponse::from).collect()))
}

async fn get_payee(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PayeeResponse>, AppError> {
    let address = Address::parse(&address)?;

    let payee = state
        .store
        .get_payee(&address)
        .await?
        .ok_or_else(|| AppError::PayeeNotFound(address.to_string()))?;

    Ok(Json(payee.into()))
}

// =========================================================================
// Months
// =========================================================================

fn parse_month_key(value: Option<&str>) -> Result<Option<MonthKey>, DomainError> {
    value.map(str::parse).transpose()
}

async fn list_months(
    State(state): State<AppState>,
    Query(query): Query<MonthRangeQuery>,
) -> Result<Json<Vec<MonthResponse>>, AppError> {
    let from = parse_month_key(query.from.as_deref())?;
    let to = parse_month_key(query.to.as_deref())?;

    let months = state.store.list_months(from, to).await?;
    Ok(Json(months.into_iter().map(MonthResponse::from).collect()))
}

async fn get_month(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MonthResponse>, AppError> {
    let key: MonthKey = key.parse()?;

    let month = state
        .store
        .get_month(key)
        .await?
        .ok_or_else(|| AppError::MonthNotFound(key.to_string()))?;

    Ok(Json(month.into()))
}

// =========================================================================
// Event log
// =========================================================================

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsListResponse>, AppError> {
    let kind = query.kind.as_deref();
    let page = Page::new(query.limit, query.offset);

    let events = state.store.list_events(kind, page).await?;
    let total = state.store.count_events(kind).await?;

    Ok(Json(EventsListResponse { events, total }))
}

async fn get_checkpoint(
    State(state): State<AppState>,
) -> Result<Json<CheckpointResponse>, AppError> {
    let checkpoint = state.store.last_checkpoint().await?;
    Ok(Json(CheckpointResponse { checkpoint }))
}

/// Ingest a batch of raw contract events in order
async fn ingest_events(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<BatchReport>, AppError> {
    let records = request.events.into_iter().enumerate().map(|(index, value)| {
        let record = serde_json::from_value::<EventRecord>(value)
            .map_err(|e| DomainError::invalid_field("record", e.to_string()));
        (index, record)
    });

    let ingestor = state.ingestor.lock().await;
    let report = ingestor.ingest_batch(records).await?;

    tracing::info!(
        applied = report.applied,
        duplicates = report.duplicates,
        rejected = report.rejected.len(),
        "Batch ingested"
    );

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_query_defaults() {
        let query: EventsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
        assert!(query.kind.is_none());
    }

    #[test]
    fn test_parse_month_key() {
        assert_eq!(parse_month_key(None).unwrap(), None);
        assert_eq!(parse_month_key(Some("197013")).unwrap().map(|k| k.value()), Some(197013));
        assert!(parse_month_key(Some("197014")).is_err());
    }

    #[test]
    fn test_month_response_splits_key() {
        let month = MonthAggregate::from_stored("202403".parse().unwrap(), TokenAmount::new(7));
        let response = MonthResponse::from(month);

        assert_eq!(response.year, 2024);
        assert_eq!(response.month, 3);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["key"], 202403);
        assert_eq!(json["total_cost"], "7");
    }
}
