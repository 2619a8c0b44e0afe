//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::AmountError;

/// Validation failures for incoming contract events and their fields.
///
/// These are raised before any store access, so a rejected event never
/// leaves partial state behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Required field absent from the event record
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Field present but not valid `0x` hex
    #[error("Invalid hex value: {0}")]
    InvalidHex(String),

    /// Amount field could not be parsed or combined
    #[error("Invalid amount for {field}: {source}")]
    InvalidAmount {
        field: &'static str,
        #[source]
        source: AmountError,
    },

    /// Field has the wrong JSON type or range
    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Event kind not emitted by the payroll contract
    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    /// Not a `YYYYMM` month bucket
    #[error("Invalid month key: {0}")]
    InvalidMonthKey(String),
}

impl DomainError {
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error describes a malformed event (missing payee, amount...)
    pub fn is_malformed_event(&self) -> bool {
        !matches!(self, Self::InvalidMonthKey(_))
    }
}
