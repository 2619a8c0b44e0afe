//! Token amount type
//!
//! On-chain token amounts are integers in the token's smallest unit.
//! They are carried as `u128` and every addition is checked, so a total can
//! never wrap or lose precision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TokenAmount represents a non-negative integer quantity of token units.
///
/// # Invariants
/// - Value is an exact integer (no decimals, no floating point)
/// - Arithmetic never wraps; overflow is reported as an error
///
/// # Example
/// ```
/// use payroll_indexer::domain::TokenAmount;
///
/// let amount: TokenAmount = "1000".parse().unwrap();
/// let total = amount.checked_add(TokenAmount::new(500)).unwrap();
/// assert_eq!(total.value(), 1500);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(u128);

/// Errors that can occur when creating or combining a TokenAmount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount overflow: {current} + {delta} exceeds 128-bit range")]
    Overflow { current: u128, delta: u128 },

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    /// Add another amount, failing instead of wrapping.
    pub fn checked_add(self, other: TokenAmount) -> Result<TokenAmount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(TokenAmount)
            .ok_or(AmountError::Overflow {
                current: self.0,
                delta: other.0,
            })
    }

    /// Parse from a JSON value holding either a decimal string or an integer.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, AmountError> {
        match value {
            serde_json::Value::String(s) => s.parse(),
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(|v| TokenAmount(v as u128))
                .ok_or_else(|| AmountError::ParseError(n.to_string())),
            other => Err(AmountError::ParseError(other.to_string())),
        }
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // u128::from_str accepts a leading '+', on-chain values never carry one
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::ParseError(s.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(TokenAmount)
            .map_err(|e| AmountError::ParseError(format!("{}: {}", s, e)))
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TokenAmount::from_str(&value)
    }
}

impl From<TokenAmount> for String {
    fn from(amount: TokenAmount) -> Self {
        amount.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_from_str() {
        let amount: TokenAmount = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(amount.value(), 123456789012345678901234567890u128);
    }

    #[test]
    fn test_amount_rejects_decimals_and_signs() {
        assert!(matches!("1.5".parse::<TokenAmount>(), Err(AmountError::ParseError(_))));
        assert!(matches!("-1".parse::<TokenAmount>(), Err(AmountError::ParseError(_))));
        assert!(matches!("+1".parse::<TokenAmount>(), Err(AmountError::ParseError(_))));
        assert!(matches!("".parse::<TokenAmount>(), Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_amount_beyond_u128_rejected() {
        // u128::MAX is 340282366920938463463374607431768211455
        let result = "340282366920938463463374607431768211456".parse::<TokenAmount>();
        assert!(matches!(result, Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_checked_add() {
        let a = TokenAmount::new(1000);
        let b = TokenAmount::new(500);
        assert_eq!(a.checked_add(b).unwrap(), TokenAmount::new(1500));
    }

    #[test]
    fn test_checked_add_overflow() {
        let a = TokenAmount::new(u128::MAX - 1);
        let result = a.checked_add(TokenAmount::new(2));
        assert_eq!(
            result,
            Err(AmountError::Overflow {
                current: u128::MAX - 1,
                delta: 2
            })
        );
    }

    #[test]
    fn test_amount_from_json() {
        let from_string = TokenAmount::from_json(&serde_json::json!("42")).unwrap();
        let from_number = TokenAmount::from_json(&serde_json::json!(42)).unwrap();
        assert_eq!(from_string, from_number);

        assert!(TokenAmount::from_json(&serde_json::json!(-1)).is_err());
        assert!(TokenAmount::from_json(&serde_json::json!(1.5)).is_err());
        assert!(TokenAmount::from_json(&serde_json::Value::Null).is_err());
    }

    #[test]
    fn test_amount_serializes_as_string() {
        let amount = TokenAmount::new(u128::MAX);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, format!("\"{}\"", u128::MAX));

        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
