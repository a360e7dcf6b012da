//! Sui chain types, signing primitives and JSON-RPC provider.
//!
//! - [`SuiAddress`] - 32-byte address, hex on the wire and raw bytes in BCS
//! - [`types`] - the BCS layout of `TransactionData` for programmable transactions
//! - [`crypto`] - intent digests and the 97-byte ed25519 serialized signature
//! - [`provider`] - the [`SuiRpc`] capability and its JSON-RPC implementation

pub mod crypto;
pub mod provider;
pub mod types;

pub use crypto::*;
pub use provider::*;
pub use types::*;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Coin type of native SUI, in short form.
pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// Number of hex characters in a full-length address.
pub const SUI_ADDRESS_HEX_LEN: usize = 64;

// ============================================================================
// SuiAddress
// ============================================================================

/// A Sui address or object ID.
///
/// Parsing accepts `0x` followed by 1 to 64 hex characters and left-pads to the
/// full 32 bytes. Display always prints the normalized 64-character form.
///
/// # Example
///
/// ```
/// use x402_multichain::chain::sui::SuiAddress;
///
/// let addr: SuiAddress = "0x2".parse().unwrap();
/// assert_eq!(
///     addr.to_string(),
///     "0x0000000000000000000000000000000000000000000000000000000000000002"
/// );
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SuiAddress(pub [u8; 32]);

/// Object IDs share the address representation.
pub type ObjectId = SuiAddress;

impl SuiAddress {
    pub const ZERO: SuiAddress = SuiAddress([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses only the strict full form: `0x` plus exactly 64 hex characters.
    pub fn parse_full(s: &str) -> Result<Self, SuiAddressParseError> {
        let hex_part = strip_hex_prefix(s)?;
        if hex_part.len() != SUI_ADDRESS_HEX_LEN {
            return Err(SuiAddressParseError::InvalidLength(hex_part.len()));
        }
        s.parse()
    }
}

fn strip_hex_prefix(s: &str) -> Result<&str, SuiAddressParseError> {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or(SuiAddressParseError::MissingPrefix)
}

impl FromStr for SuiAddress {
    type Err = SuiAddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = strip_hex_prefix(s)?;
        if hex_part.is_empty() || hex_part.len() > SUI_ADDRESS_HEX_LEN {
            return Err(SuiAddressParseError::InvalidLength(hex_part.len()));
        }
        let padded = format!("{hex_part:0>64}");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes)
            .map_err(|e| SuiAddressParseError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Display for SuiAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for SuiAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for SuiAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

/// Error returned when parsing a Sui address.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SuiAddressParseError {
    #[error("Sui address must start with 0x")]
    MissingPrefix,
    #[error("Sui address must have 1 to 64 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

/// `0x` + 1-64 hex characters.
pub fn is_valid_sui_address(s: &str) -> bool {
    s.parse::<SuiAddress>().is_ok()
}

/// `0x` + exactly 64 hex characters.
pub fn is_valid_sui_address_full(s: &str) -> bool {
    SuiAddress::parse_full(s).is_ok()
}

/// Normalizes an address to its 64-character form.
pub fn normalize_sui_address(s: &str) -> Result<String, SuiAddressParseError> {
    s.parse::<SuiAddress>().map(|a| a.to_string())
}

// ============================================================================
// Coin types
// ============================================================================

/// Normalizes `<address>::<module>::<name>` by padding the address.
///
/// Generic parameters are not supported; coin types used for payments are plain
/// struct tags.
pub fn normalize_coin_type(coin_type: &str) -> Result<String, SuiAddressParseError> {
    let mut parts = coin_type.splitn(3, "::");
    let (Some(address), Some(module), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(SuiAddressParseError::InvalidHex(format!(
            "not a coin type: {coin_type}"
        )));
    };
    if !is_identifier(module) || !is_identifier(name) {
        return Err(SuiAddressParseError::InvalidHex(format!(
            "not a coin type: {coin_type}"
        )));
    }
    let address: SuiAddress = address.parse()?;
    Ok(format!("{address}::{module}::{name}"))
}

pub fn is_valid_coin_type(coin_type: &str) -> bool {
    normalize_coin_type(coin_type).is_ok()
}

/// Whether `coin_type` is native SUI, in any address form.
pub fn is_native_sui(coin_type: &str) -> bool {
    match (normalize_coin_type(coin_type), normalize_coin_type(SUI_COIN_TYPE)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address_is_padded() {
        let addr: SuiAddress = "0xabc".parse().unwrap();
        assert_eq!(addr.0[30], 0x0a);
        assert_eq!(addr.0[31], 0xbc);
        assert!(addr.0[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_address_validators() {
        let full = format!("0x{}", "ab".repeat(32));
        assert!(is_valid_sui_address("0x2"));
        assert!(is_valid_sui_address(&full));
        assert!(!is_valid_sui_address("2"));
        assert!(!is_valid_sui_address("0x"));
        assert!(!is_valid_sui_address("0xzz"));
        assert!(!is_valid_sui_address(&format!("{full}0")));

        assert!(is_valid_sui_address_full(&full));
        assert!(!is_valid_sui_address_full("0x2"));
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_sui_address("0x2").unwrap(),
            format!("0x{}2", "0".repeat(63))
        );
    }

    #[test]
    fn test_coin_type_normalization() {
        let normalized = normalize_coin_type("0x2::sui::SUI").unwrap();
        assert_eq!(normalized, format!("0x{}2::sui::SUI", "0".repeat(63)));
        assert!(is_native_sui(&normalized));
        assert!(is_native_sui("0x2::sui::SUI"));
        assert!(!is_native_sui("0x3::sui::SUI"));
        assert!(!is_valid_coin_type("0x2::sui"));
        assert!(!is_valid_coin_type("0x2::1sui::SUI"));
    }

    #[test]
    fn test_address_json_and_bcs_forms() {
        let addr: SuiAddress = "0x1".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0x{}1\"", "0".repeat(63)));
        let back: SuiAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);

        let bytes = bcs::to_bytes(&addr).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bcs::from_bytes::<SuiAddress>(&bytes).unwrap(), addr);
    }
}
