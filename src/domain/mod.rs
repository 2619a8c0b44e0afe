//! Domain module
//!
//! Core domain types: amounts, identifiers, month buckets and contract events.

pub mod address;
pub mod amount;
pub mod bucket;
pub mod error;
pub mod events;

pub use address::{normalize_hex, Address};
pub use amount::{AmountError, TokenAmount};
pub use bucket::{bucket_key, MonthKey, SECONDS_PER_MONTH, SECONDS_PER_YEAR};
pub use error::DomainError;
pub use events::{
    ClaimEvent, EventId, EventMeta, EventPosition, EventRecord, PayrollEvent, PayrollEventKind,
};
