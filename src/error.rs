//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::engine::IndexerError;
use crate::ingest::BatchHalted;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Payee not found: {0}")]
    PayeeNotFound(String),

    #[error("Month not found: {0}")]
    MonthNotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error(transparent)]
    BatchHalted(#[from] BatchHalted),

    // Server errors (5xx)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            // 400 Bad Request
            AppError::Domain(e) => (StatusCode::BAD_REQUEST, domain_code(e), Some(e.to_string())),

            // 401 Unauthorized
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key", None),

            // 404 Not Found
            AppError::PayeeNotFound(id) => {
                (StatusCode::NOT_FOUND, "payee_not_found", Some(id.clone()))
            }
            AppError::MonthNotFound(key) => {
                (StatusCode::NOT_FOUND, "month_not_found", Some(key.clone()))
            }

            AppError::Indexer(err) => indexer_status(err),
            AppError::BatchHalted(halted) => {
                let (status, code, details) = indexer_status(&halted.source);
                let details = details.map(|d| {
                    format!(
                        "record {}: {} (applied {}, duplicates {} before halt)",
                        halted.index, d, halted.report.applied, halted.report.duplicates
                    )
                });
                (status, code, details)
            }

            // 500 Internal Server Error
            AppError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error", None)
            }
        }
    }
}

fn indexer_status(err: &IndexerError) -> (StatusCode, &'static str, Option<String>) {
    match err {
        IndexerError::Malformed(e) => (
            StatusCode::BAD_REQUEST,
            "malformed_event",
            Some(e.to_string()),
        ),
        IndexerError::Overflow { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "amount_overflow",
            Some(err.to_string()),
        ),
        IndexerError::OutOfOrder { .. } => {
            (StatusCode::CONFLICT, "out_of_order", Some(err.to_string()))
        }
        IndexerError::Store(e) => {
            tracing::error!("Store error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "store_error", None)
        }
    }
}

fn domain_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::InvalidHex(_) => "invalid_address",
        e if e.is_malformed_event() => "malformed_event",
        _ => "invalid_month_key",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.status_and_code();

        // Server-side failures never leak their cause
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
