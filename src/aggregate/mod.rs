//! Aggregate module
//!
//! Derived summary entities folded from the claim stream.

pub mod month;
pub mod payee;

pub use month::MonthAggregate;
pub use payee::PayeeAggregate;

/// Aggregate trait that all projections must implement
pub trait Aggregate {
    /// Identity type (primary key in the store)
    type Id: std::fmt::Display;

    /// Get the aggregate type name (for storage and diagnostics)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> &Self::Id;

    /// True while the record has never been saved
    fn is_new(&self) -> bool;
}
