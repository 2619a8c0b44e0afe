//! Common test utilities

#![allow(dead_code)]

use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use payroll_indexer::db;

/// Fresh in-memory database with migrations applied.
///
/// A single connection keeps every query on the same memory database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    db::migrate(&pool).await.expect("Failed to run migrations");

    pool
}

/// Raw `PayrollClaimed` record as a source would deliver it
pub fn claim_json(
    employee: &str,
    amount: &str,
    block_number: u64,
    log_index: u32,
    timestamp: u64,
) -> Value {
    json!({
        "kind": "PayrollClaimed",
        "tx_hash": format!("0x{:064x}", block_number),
        "log_index": log_index,
        "block_number": block_number,
        "block_timestamp": timestamp,
        "params": {
            "payroll_id": "1",
            "employee": employee,
            "amount": amount
        }
    })
}

/// Raw `RoleGranted` record
pub fn role_granted_json(block_number: u64, log_index: u32) -> Value {
    json!({
        "kind": "RoleGranted",
        "tx_hash": format!("0x{:064x}", block_number),
        "log_index": log_index,
        "block_number": block_number,
        "block_timestamp": 1_700_000_000u64,
        "params": {
            "role": format!("0x{}", "00".repeat(32)),
            "account": "0x00000000000000000000000000000000000000AA",
            "sender": "0x00000000000000000000000000000000000000BB"
        }
    })
}
