//! Contract Events
//!
//! Event definitions for the payroll contract log stream.
//! Events are immutable facts that have happened on chain.
//!
//! Incoming events arrive as loosely-typed [`EventRecord`]s and are decoded
//! into [`PayrollEvent`]s; decoding is where malformed input is rejected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::{normalize_hex, Address, DomainError, TokenAmount};

/// Stable unique id of a log entry: `<tx_hash>-<log_index>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn from_parts(tx_hash: &str, log_index: u32) -> Result<Self, DomainError> {
        let tx_hash = normalize_hex(tx_hash)?;
        Ok(Self(format!("{}-{}", tx_hash, log_index)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild an id read back from storage
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a log entry in the chain's total order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u32,
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// Largest block number or timestamp accepted; positions are stored as signed 64-bit
pub const MAX_CHAIN_VALUE: u64 = i64::MAX as u64;

fn check_chain_value(field: &'static str, value: u64) -> Result<u64, DomainError> {
    if value > MAX_CHAIN_VALUE {
        return Err(DomainError::invalid_field(
            field,
            format!("{} exceeds {}", value, MAX_CHAIN_VALUE),
        ));
    }
    Ok(value)
}

/// Chain metadata common to every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: EventId,
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub block_timestamp: u64,
}

impl EventMeta {
    pub fn new(
        tx_hash: &str,
        log_index: u32,
        block_number: u64,
        block_timestamp: u64,
    ) -> Result<Self, DomainError> {
        let event_id = EventId::from_parts(tx_hash, log_index)?;
        Ok(Self {
            event_id,
            tx_hash: normalize_hex(tx_hash)?,
            log_index,
            block_number: check_chain_value("block_number", block_number)?,
            block_timestamp: check_chain_value("block_timestamp", block_timestamp)?,
        })
    }

    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }
}

/// Payroll contract events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PayrollEventKind {
    /// An employee claimed their payroll
    PayrollClaimed {
        payroll_id: String,
        employee: Address,
        amount: TokenAmount,
    },

    /// Funds were deposited into the payroll pool
    PayrollDeposited {
        depositor: Address,
        amount: TokenAmount,
    },

    /// A payroll run was executed
    PayrollExecuted {
        payroll_id: String,
        total_amount: TokenAmount,
        employee_count: u64,
    },

    /// Admin drained the contract
    EmergencyWithdraw { admin: Address, amount: TokenAmount },

    Paused { account: Address },

    Unpaused { account: Address },

    RoleGranted {
        role: String,
        account: Address,
        sender: Address,
    },

    RoleRevoked {
        role: String,
        account: Address,
        sender: Address,
    },

    RoleAdminChanged {
        role: String,
        previous_admin_role: String,
        new_admin_role: String,
    },
}

impl PayrollEventKind {
    /// Get the event kind as a string
    pub fn kind_name(&self) -> &'static str {
        match self {
            PayrollEventKind::PayrollClaimed { .. } => "PayrollClaimed",
            PayrollEventKind::PayrollDeposited { .. } => "PayrollDeposited",
            PayrollEventKind::PayrollExecuted { .. } => "PayrollExecuted",
            PayrollEventKind::EmergencyWithdraw { .. } => "EmergencyWithdraw",
            PayrollEventKind::Paused { .. } => "Paused",
            PayrollEventKind::Unpaused { .. } => "Unpaused",
            PayrollEventKind::RoleGranted { .. } => "RoleGranted",
            PayrollEventKind::RoleRevoked { .. } => "RoleRevoked",
            PayrollEventKind::RoleAdminChanged { .. } => "RoleAdminChanged",
        }
    }

    /// Decode the kind-specific parameters of a record
    fn decode(kind: &str, params: &Map<String, Value>) -> Result<Self, DomainError> {
        let event = match kind {
            "PayrollClaimed" => PayrollEventKind::PayrollClaimed {
                payroll_id: uint_param(params, "payroll_id")?,
                employee: address_param(params, "employee")?,
                amount: amount_param(params, "amount")?,
            },
            "PayrollDeposited" => PayrollEventKind::PayrollDeposited {
                depositor: address_param(params, "depositor")?,
                amount: amount_param(params, "amount")?,
            },
            "PayrollExecuted" => PayrollEventKind::PayrollExecuted {
                payroll_id: uint_param(params, "payroll_id")?,
                total_amount: amount_param(params, "total_amount")?,
                employee_count: u64_param(params, "employee_count")?,
            },
            "EmergencyWithdraw" => PayrollEventKind::EmergencyWithdraw {
                admin: address_param(params, "admin")?,
                amount: amount_param(params, "amount")?,
            },
            "Paused" => PayrollEventKind::Paused {
                account: address_param(params, "account")?,
            },
            "Unpaused" => PayrollEventKind::Unpaused {
                account: address_param(params, "account")?,
            },
            "RoleGranted" => PayrollEventKind::RoleGranted {
                role: hex_param(params, "role")?,
                account: address_param(params, "account")?,
                sender: address_param(params, "sender")?,
            },
            "RoleRevoked" => PayrollEventKind::RoleRevoked {
                role: hex_param(params, "role")?,
                account: address_param(params, "account")?,
                sender: address_param(params, "sender")?,
            },
            "RoleAdminChanged" => PayrollEventKind::RoleAdminChanged {
                role: hex_param(params, "role")?,
                previous_admin_role: hex_param(params, "previous_admin_role")?,
                new_admin_role: hex_param(params, "new_admin_role")?,
            },
            other => return Err(DomainError::UnknownKind(other.to_string())),
        };
        Ok(event)
    }
}

/// A decoded, validated contract event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollEvent {
    pub meta: EventMeta,
    pub kind: PayrollEventKind,
}

impl PayrollEvent {
    pub fn new(meta: EventMeta, kind: PayrollEventKind) -> Self {
        Self { meta, kind }
    }

    pub fn event_id(&self) -> &EventId {
        &self.meta.event_id
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }

    pub fn position(&self) -> EventPosition {
        self.meta.position()
    }

    /// The claim this event represents, if it is a `PayrollClaimed`
    pub fn as_claim(&self) -> Option<ClaimEvent> {
        match &self.kind {
            PayrollEventKind::PayrollClaimed {
                employee, amount, ..
            } => Some(ClaimEvent {
                event_id: self.meta.event_id.clone(),
                payee: employee.clone(),
                amount: *amount,
                timestamp: self.meta.block_timestamp,
            }),
            _ => None,
        }
    }
}

/// Input to the aggregation engine: one payroll claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEvent {
    pub event_id: EventId,
    pub payee: Address,
    pub amount: TokenAmount,
    pub timestamp: u64,
}

impl ClaimEvent {
    pub fn new(event_id: EventId, payee: Address, amount: TokenAmount, timestamp: u64) -> Self {
        Self {
            event_id,
            payee,
            amount,
            timestamp,
        }
    }
}

// =========================================================================
// Raw records
// =========================================================================

/// An event as delivered by a source, before validation.
///
/// Every field is optional so that a missing payee or amount is reported as
/// a malformed event rather than a deserialization failure of the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<u32>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub block_timestamp: Option<u64>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl EventRecord {
    /// Decode and validate this record
    pub fn decode(&self) -> Result<PayrollEvent, DomainError> {
        let kind = self.kind.as_deref().ok_or(DomainError::MissingField("kind"))?;
        let tx_hash = self
            .tx_hash
            .as_deref()
            .ok_or(DomainError::MissingField("tx_hash"))?;
        let log_index = self.log_index.ok_or(DomainError::MissingField("log_index"))?;
        let block_number = self
            .block_number
            .ok_or(DomainError::MissingField("block_number"))?;
        let block_timestamp = self
            .block_timestamp
            .ok_or(DomainError::MissingField("block_timestamp"))?;

        let meta = EventMeta::new(tx_hash, log_index, block_number, block_timestamp)?;
        let kind = PayrollEventKind::decode(kind, &self.params)?;

        Ok(PayrollEvent::new(meta, kind))
    }
}

impl From<&PayrollEvent> for EventRecord {
    fn from(event: &PayrollEvent) -> Self {
        let mut params = match serde_json::to_value(&event.kind) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        params.remove("kind");

        Self {
            kind: Some(event.kind_name().to_string()),
            tx_hash: Some(event.meta.tx_hash.clone()),
            log_index: Some(event.meta.log_index),
            block_number: Some(event.meta.block_number),
            block_timestamp: Some(event.meta.block_timestamp),
            params,
        }
    }
}

fn require<'a>(
    params: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, DomainError> {
    match params.get(field) {
        None | Some(Value::Null) => Err(DomainError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn address_param(params: &Map<String, Value>, field: &'static str) -> Result<Address, DomainError> {
    match require(params, field)? {
        Value::String(s) => Address::parse(s),
        other => Err(DomainError::invalid_field(
            field,
            format!("expected hex string, got {}", other),
        )),
    }
}

fn hex_param(params: &Map<String, Value>, field: &'static str) -> Result<String, DomainError> {
    match require(params, field)? {
        Value::String(s) => normalize_hex(s),
        other => Err(DomainError::invalid_field(
            field,
            format!("expected hex string, got {}", other),
        )),
    }
}

fn amount_param(
    params: &Map<String, Value>,
    field: &'static str,
) -> Result<TokenAmount, DomainError> {
    TokenAmount::from_json(require(params, field)?)
        .map_err(|source| DomainError::InvalidAmount { field, source })
}

/// uint256 identifiers kept in canonical decimal form
fn uint_param(params: &Map<String, Value>, field: &'static str) -> Result<String, DomainError> {
    amount_param(params, field).map(|value| value.to_string())
}

fn u64_param(params: &Map<String, Value>, field: &'static str) -> Result<u64, DomainError> {
    let value = require(params, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        DomainError::invalid_field(field, format!("expected unsigned integer, got {}", value))
    })
}
