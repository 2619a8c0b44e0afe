//! Hex identifiers
//!
//! Addresses, transaction hashes and role ids arrive as `0x`-prefixed hex in
//! arbitrary case. They are normalized to lowercase at the boundary so that
//! `0xAA` and `0xaa` address the same aggregate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Normalize a `0x`-prefixed hex string to lowercase.
///
/// The payload must be non-empty and decode to whole bytes.
pub fn normalize_hex(value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| DomainError::InvalidHex(value.to_string()))?;

    if digits.is_empty() {
        return Err(DomainError::InvalidHex(value.to_string()));
    }

    let bytes = hex::decode(digits).map_err(|_| DomainError::InvalidHex(value.to_string()))?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// An account address (payee, depositor, admin...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        normalize_hex(value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalized_to_lowercase() {
        let address = Address::parse("0xAA").unwrap();
        assert_eq!(address.as_str(), "0xaa");
        assert_eq!(address, Address::parse("0xaa").unwrap());
    }

    #[test]
    fn test_full_length_address() {
        let address = Address::parse("0xA16081F360e3847006dB660bae1c6d1b2e17eC2A").unwrap();
        assert_eq!(address.as_str(), "0xa16081f360e3847006db660bae1c6d1b2e17ec2a");
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        for bad in ["", "0x", "aa", "0xZZ", "0xabc"] {
            assert!(
                matches!(Address::parse(bad), Err(DomainError::InvalidHex(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_address_serde_normalizes() {
        let address: Address = serde_json::from_str(r#""0xBEEF""#).unwrap();
        assert_eq!(address.as_str(), "0xbeef");
        assert!(serde_json::from_str::<Address>(r#""beef""#).is_err());
    }
}
