//! payroll_indexer Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
mod error;
pub mod ingest;
pub mod store;

pub use config::{Config, LogFormat};
pub use domain::{
    Address, ClaimEvent, DomainError, EventRecord, MonthKey, PayrollEvent, TokenAmount,
};
pub use engine::{AggregationEngine, ClaimOutcome, IndexerError};
pub use error::{AppError, AppResult};
pub use ingest::{BatchReport, IngestOutcome, Ingestor, ReplayError};
