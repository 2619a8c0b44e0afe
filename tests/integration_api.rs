//! API integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use payroll_indexer::api::{self, middleware::hash_api_key, AppState};
use payroll_indexer::store::SqliteStore;

mod common;

async fn app(api_key: Option<&str>) -> Router {
    let pool = common::setup_test_db().await;
    let state = AppState::new(Arc::new(SqliteStore::new(pool)), api_key.map(hash_api_key));
    api::build_router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_events(events: Vec<Value>, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/events")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder
        .body(Body::from(json!({ "events": events }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app(None).await;

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_ingest_then_query_e2e() {
    let app = app(None).await;

    // 1. Ingest a batch with one malformed element and one redelivery
    let batch = vec![
        common::claim_json("0xAA", "1000", 1, 0, 0),
        common::claim_json("0xAA", "500", 2, 0, 2_592_000),
        json!({ "kind": "PayrollClaimed", "tx_hash": "0x01" }),
        common::claim_json("0xBB", "200", 3, 0, 2_592_000),
        common::claim_json("0xAA", "1000", 1, 0, 0),
        common::role_granted_json(4, 0),
    ];
    let (status, report) = send(&app, post_events(batch, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["applied"], 4);
    assert_eq!(report["duplicates"], 1);
    assert_eq!(report["rejected"][0]["index"], 2);

    // 2. Payee by address, any case
    let (status, payee) = send(&app, get("/api/v1/payees/0xaA")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payee["address"], "0xaa");
    assert_eq!(payee["total_paid"], "1500");
    assert_eq!(payee["last_paid_at"], 2_592_000);

    let (_, payees) = send(&app, get("/api/v1/payees?limit=1&offset=1")).await;
    assert_eq!(payees.as_array().unwrap().len(), 1);
    assert_eq!(payees[0]["address"], "0xbb");

    // 3. Months
    let (_, months) = send(&app, get("/api/v1/months")).await;
    assert_eq!(months[0]["key"], 197001);
    assert_eq!(months[0]["total_cost"], "1000");
    assert_eq!(months[1]["key"], 197002);
    assert_eq!(months[1]["total_cost"], "700");

    let (status, month) = send(&app, get("/api/v1/months/197002")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(month["year"], 1970);
    assert_eq!(month["month"], 2);

    let (_, ranged) = send(&app, get("/api/v1/months?from=197002&to=197012")).await;
    assert_eq!(ranged.as_array().unwrap().len(), 1);

    // 4. Event log and checkpoint
    let (_, events) = send(&app, get("/api/v1/events?kind=RoleGranted")).await;
    assert_eq!(events["total"], 1);
    assert_eq!(events["events"][0]["kind"], "RoleGranted");

    let (_, all) = send(&app, get("/api/v1/events?limit=2")).await;
    assert_eq!(all["total"], 4);
    assert_eq!(all["events"].as_array().unwrap().len(), 2);

    let (_, checkpoint) = send(&app, get("/api/v1/checkpoint")).await;
    assert_eq!(checkpoint["checkpoint"]["block_number"], 4);
    assert_eq!(checkpoint["checkpoint"]["log_index"], 0);
}

#[tokio::test]
async fn test_not_found_and_bad_keys() {
    let app = app(None).await;

    let (status, body) = send(&app, get("/api/v1/payees/0xCC")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "payee_not_found");

    let (status, body) = send(&app, get("/api/v1/months/197001")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "month_not_found");

    let (status, body) = send(&app, get("/api/v1/months/197099")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_month_key");

    let (status, body) = send(&app, get("/api/v1/months/9223372036854775901")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_month_key");

    let (status, body) = send(&app, get("/api/v1/months?to=9223372036854775901")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_month_key");

    let (status, body) = send(&app, get("/api/v1/payees/not-hex")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_address");

    let (_, checkpoint) = send(&app, get("/api/v1/checkpoint")).await;
    assert!(checkpoint["checkpoint"].is_null());
}

#[tokio::test]
async fn test_out_of_order_batch_is_conflict() {
    let app = app(None).await;

    let first = vec![common::claim_json("0xAA", "1", 5, 0, 0)];
    let (status, _) = send(&app, post_events(first, None)).await;
    assert_eq!(status, StatusCode::OK);

    let batch = vec![
        common::claim_json("0xAA", "1", 6, 0, 0),
        common::claim_json("0xAA", "1", 4, 0, 0),
        common::claim_json("0xAA", "1", 7, 0, 0),
    ];
    let (status, body) = send(&app, post_events(batch, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "out_of_order");

    // The event before the halt stays committed, the one after is never applied
    let (_, payee) = send(&app, get("/api/v1/payees/0xAA")).await;
    assert_eq!(payee["total_paid"], "2");
}

#[tokio::test]
async fn test_oversized_position_is_rejected_not_halting() {
    let app = app(None).await;

    let mut oversized_number = common::claim_json("0xCC", "9", 1, 0, 0);
    oversized_number["block_number"] = json!(u64::MAX);

    let batch = vec![
        common::claim_json("0xAA", "5", 1, 0, u64::MAX),
        oversized_number,
        common::claim_json("0xBB", "7", 2, 0, 0),
    ];
    let (status, report) = send(&app, post_events(batch, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["applied"], 1);
    assert_eq!(report["rejected"].as_array().unwrap().len(), 2);
    assert_eq!(report["rejected"][0]["index"], 0);
    assert_eq!(report["rejected"][1]["index"], 1);

    let (status, payee) = send(&app, get("/api/v1/payees/0xBB")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payee["total_paid"], "7");

    let (status, _) = send(&app, get("/api/v1/payees/0xAA")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingest_requires_api_key_when_configured() {
    let app = app(Some("secret-key")).await;
    let batch = vec![common::claim_json("0xAA", "1", 1, 0, 0)];

    let (status, body) = send(&app, post_events(batch.clone(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "invalid_api_key");

    let (status, _) = send(&app, post_events(batch.clone(), Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, report) = send(&app, post_events(batch, Some("secret-key"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["applied"], 1);

    // Reads stay open
    let (status, _) = send(&app, get("/api/v1/payees")).await;
    assert_eq!(status, StatusCode::OK);
}
